//! Image feature extractors
use crate::error::TrackError;
use crate::torch::modules::{FeedForwardModule, Linear, LinearConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tch::nn::{FuncT, ModuleT, Path, VarStore};
use tch::vision::resnet;
use tch::Tensor;

/// Width of the pooled ResNet-18 features.
pub const RESNET18_FEATURES: usize = 512;

/// Map a batch of images to a batch of feature vectors.
pub trait FeatureExtractor {
    /// Extract one feature vector per image.
    ///
    /// # Args
    /// * `images` - A tensor of shape `[BATCH_SIZE, CHANNELS, HEIGHT, WIDTH]`.
    /// * `train` - Whether layers with train/eval behaviour (batch norm) are in training mode.
    ///
    /// # Returns
    /// A tensor of shape `[BATCH_SIZE, NUM_FEATURES]`.
    fn extract(&self, images: &Tensor, train: bool) -> Tensor;
}

/// Backbone architecture.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackboneConfig {
    /// ResNet-18 convolutional body followed by a linear `head` producing the feature vector.
    ///
    /// The body variables use the torchvision names (`conv1`, `bn1`, `layer1` .. `layer4`),
    /// so an ImageNet checkpoint can be loaded into it; the checkpoint classifier is ignored.
    ResNet18,
    /// Flatten each image and apply a linear layer followed by ReLU.
    ///
    /// For low-resolution inputs; `in_features` is `CHANNELS * HEIGHT * WIDTH`.
    Flatten { in_features: usize },
}

impl Default for BackboneConfig {
    fn default() -> Self {
        Self::ResNet18
    }
}

impl BackboneConfig {
    /// Build a backbone producing `out_dim` features with variables stored under `vs`.
    pub fn build(&self, vs: &Path, out_dim: usize) -> Backbone {
        match self {
            Self::ResNet18 => Backbone::ResNet18 {
                body: resnet::resnet18_no_final_layer(vs),
                head: Linear::new(
                    &(vs / "head"),
                    RESNET18_FEATURES,
                    out_dim,
                    &LinearConfig::default(),
                ),
            },
            Self::Flatten { in_features } => Backbone::Flatten(Linear::new(
                &(vs / "fc"),
                *in_features,
                out_dim,
                &LinearConfig::default(),
            )),
        }
    }

    /// Path of the freshly initialized layers that a pretrained file need not provide.
    const fn head_name(&self) -> Option<&'static str> {
        match self {
            Self::ResNet18 => Some("head"),
            Self::Flatten { .. } => None,
        }
    }

    /// Load pretrained weights into the backbone variables under `prefix` in `vs`.
    ///
    /// The file is one written by [`VarStore::save`] (or `Tensor::save_multi`) with variable
    /// names relative to the backbone root, e.g. an ImageNet ResNet-18. Every backbone variable
    /// must be present with a matching shape, except those of the head, which are loaded only
    /// when they match and otherwise keep their initial values. Extra file entries are ignored.
    ///
    /// Returns the number of variables copied.
    pub fn load_pretrained<P: AsRef<std::path::Path>>(
        &self,
        vs: &VarStore,
        prefix: &str,
        path: P,
    ) -> Result<usize, TrackError> {
        let pretrained: HashMap<String, Tensor> = Tensor::load_multi(path)?.into_iter().collect();
        let var_prefix = format!("{}.", prefix);
        let head_prefix = self.head_name().map(|name| format!("{}.", name));

        let _no_grad = tch::no_grad_guard();
        let mut num_targets = 0;
        let mut count = 0;
        for (name, mut target) in vs.variables() {
            let local_name = match name.strip_prefix(&var_prefix) {
                Some(local_name) => local_name,
                None => continue,
            };
            num_targets += 1;
            let in_head = head_prefix
                .as_ref()
                .map_or(false, |head| local_name.starts_with(head.as_str()));
            match pretrained.get(local_name) {
                Some(value) if value.size() == target.size() => {
                    target.f_copy_(value)?;
                    count += 1;
                }
                _ if in_head => {}
                Some(value) => {
                    return Err(TrackError::VariableShape {
                        name: local_name.into(),
                        expected: target.size(),
                        actual: value.size(),
                    })
                }
                None => return Err(TrackError::MissingVariable(local_name.into())),
            }
        }
        if num_targets == 0 {
            return Err(TrackError::NoBackbone(prefix.into()));
        }
        Ok(count)
    }
}

/// Image feature extractor network.
pub enum Backbone {
    ResNet18 { body: FuncT<'static>, head: Linear },
    Flatten(Linear),
}

impl fmt::Debug for Backbone {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ResNet18 { head, .. } => f
                .debug_struct("Backbone::ResNet18")
                .field("head", head)
                .finish_non_exhaustive(),
            Self::Flatten(linear) => f.debug_tuple("Backbone::Flatten").field(linear).finish(),
        }
    }
}

impl FeatureExtractor for Backbone {
    fn extract(&self, images: &Tensor, train: bool) -> Tensor {
        match self {
            Self::ResNet18 { body, head } => head.forward(&body.forward_t(images, train)),
            Self::Flatten(linear) => linear.forward(&images.flatten(1, -1)).relu(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::torch::modules::testing;
    use std::path::PathBuf;
    use tch::{Device, Kind};

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("tracklearn-{}-{}.ot", name, std::process::id()))
    }

    fn save_flatten(in_features: usize, out_dim: usize, path: &PathBuf) -> VarStore {
        let store = VarStore::new(Device::Cpu);
        let _ = BackboneConfig::Flatten { in_features }.build(&store.root(), out_dim);
        store.save(path).unwrap();
        store
    }

    #[test]
    fn flatten_extract_shape() {
        let vs = VarStore::new(Device::Cpu);
        let backbone = BackboneConfig::Flatten { in_features: 48 }.build(&vs.root(), 16);
        let images = Tensor::rand(&[5, 3, 4, 4], (Kind::Float, Device::Cpu));
        let features = backbone.extract(&images, false);
        assert_eq!(features.size(), [5, 16]);
        assert!(bool::from(features.greater_equal(0.0).all()));
    }

    #[test]
    fn resnet18_extract_shape() {
        let vs = VarStore::new(Device::Cpu);
        let backbone = BackboneConfig::ResNet18.build(&vs.root(), 256);
        let images = Tensor::rand(&[2, 3, 32, 32], (Kind::Float, Device::Cpu));
        let features = tch::no_grad(|| backbone.extract(&images, false));
        assert_eq!(features.size(), [2, 256]);
        assert_eq!(vs.variables()["head.weight"].size(), [256, 512]);
    }

    #[test]
    fn load_imagenet_resnet18_body() {
        let path = temp_path("imagenet-resnet18");
        let imagenet = VarStore::new(Device::Cpu);
        let _ = resnet::resnet18(&imagenet.root(), 1000);
        imagenet.save(&path).unwrap();

        let vs = VarStore::new(Device::Cpu);
        let _ = BackboneConfig::ResNet18.build(&(&vs.root() / "backbone"), 256);
        let head_before = vs.variables()["backbone.head.weight"].copy();
        let count = BackboneConfig::ResNet18
            .load_pretrained(&vs, "backbone", &path)
            .unwrap();
        std::fs::remove_file(&path).unwrap();

        let source = imagenet.variables();
        let target = vs.variables();
        // Everything except the 1000-way classifier
        assert_eq!(count, source.len() - 2);
        for name in ["conv1.weight", "bn1.running_mean", "layer4.1.conv2.weight"] {
            testing::assert_allclose(&target[&format!("backbone.{}", name)], &source[name]);
        }
        assert_eq!(target["backbone.head.weight"], head_before);
        assert!(!target.contains_key("backbone.fc.weight"));
    }

    #[test]
    fn load_pretrained_copies_weights() {
        let path = temp_path("load-pretrained");
        let pretrained = save_flatten(12, 8, &path);

        let vs = VarStore::new(Device::Cpu);
        let config = BackboneConfig::Flatten { in_features: 12 };
        let _ = config.build(&(&vs.root() / "backbone"), 8);
        let count = config.load_pretrained(&vs, "backbone", &path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(count, 2);
        let source = pretrained.variables();
        let target = vs.variables();
        testing::assert_allclose(&source["fc.weight"], &target["backbone.fc.weight"]);
        testing::assert_allclose(&source["fc.bias"], &target["backbone.fc.bias"]);
    }

    #[test]
    fn load_pretrained_shape_mismatch() {
        let path = temp_path("shape-mismatch");
        let _ = save_flatten(12, 8, &path);

        let vs = VarStore::new(Device::Cpu);
        let config = BackboneConfig::Flatten { in_features: 24 };
        let _ = config.build(&(&vs.root() / "backbone"), 8);
        let result = config.load_pretrained(&vs, "backbone", &path);
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(
            result,
            Err(TrackError::VariableShape { name, .. }) if name == "fc.weight"
        ));
    }

    #[test]
    fn load_pretrained_missing_variable() {
        let path = temp_path("missing-variable");
        let store = VarStore::new(Device::Cpu);
        let _ = (&store.root() / "other").zeros("weight", &[8, 12]);
        store.save(&path).unwrap();

        let vs = VarStore::new(Device::Cpu);
        let config = BackboneConfig::Flatten { in_features: 12 };
        let _ = config.build(&(&vs.root() / "backbone"), 8);
        let result = config.load_pretrained(&vs, "backbone", &path);
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(result, Err(TrackError::MissingVariable(_))));
    }

    #[test]
    fn load_pretrained_wrong_prefix() {
        let path = temp_path("wrong-prefix");
        let _ = save_flatten(12, 8, &path);

        let vs = VarStore::new(Device::Cpu);
        let config = BackboneConfig::Flatten { in_features: 12 };
        let _ = config.build(&(&vs.root() / "other"), 8);
        let result = config.load_pretrained(&vs, "backbone", &path);
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(result, Err(TrackError::NoBackbone(_))));
    }

    #[test]
    fn load_pretrained_missing_file() {
        let vs = VarStore::new(Device::Cpu);
        let config = BackboneConfig::Flatten { in_features: 12 };
        let _ = config.build(&(&vs.root() / "backbone"), 8);
        let result = config.load_pretrained(&vs, "backbone", temp_path("does-not-exist"));
        assert!(matches!(result, Err(TrackError::LoadBackbone(_))));
    }
}
