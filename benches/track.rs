use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tch::{nn::VarStore, Device, Kind, Tensor};
use tracklearn::model::BackboneConfig;
use tracklearn::{TrackModel, TrackModelConfig};

fn flatten_model(vs: &VarStore) -> TrackModel {
    TrackModelConfig {
        backbone: BackboneConfig::Flatten {
            in_features: 3 * 32 * 32,
        },
        ..TrackModelConfig::default()
    }
    .build(vs)
    .unwrap()
}

fn play_step(c: &mut Criterion) {
    let vs = VarStore::new(Device::Cpu);
    let model = flatten_model(&vs);
    let _no_grad = tch::no_grad_guard();

    let mut group = c.benchmark_group("play_step_n_episodes");
    for batch_size in [1usize, 8, 64] {
        let images = Tensor::rand(
            &[batch_size as i64, 3, 32, 32],
            (Kind::Float, Device::Cpu),
        );
        let hidden = model.init_hidden_state(batch_size);
        group.throughput(Throughput::Elements(batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            &images,
            |b, images| b.iter_with_large_drop(|| model.play(images, &hidden).unwrap()),
        );
    }
    group.finish();
}

fn train_unroll(c: &mut Criterion) {
    let vs = VarStore::new(Device::Cpu);
    let model = flatten_model(&vs);

    let mut group = c.benchmark_group("train_unroll_n_frames");
    for num_frames in [1i64, 10, 100] {
        let images = Tensor::rand(&[num_frames, 3, 32, 32], (Kind::Float, Device::Cpu));
        let actions = Tensor::zeros(&[num_frames, 1], (Kind::Float, Device::Cpu));
        let hidden = model.init_hidden_state(1);
        group.throughput(Throughput::Elements(num_frames as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(num_frames),
            &images,
            |b, images| {
                b.iter_with_large_drop(|| model.train(images, &actions, &hidden).unwrap())
            },
        );
    }
    group.finish();
}

criterion_group!(benches, play_step, train_unroll);
criterion_main!(benches);
