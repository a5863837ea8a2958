use std::collections::BTreeMap;
use std::path::Path;

use ndarray::{Array1, Array2, Array3, Array4, Axis};
use safetensors::tensor::TensorView;
use safetensors::{Dtype, SafeTensors};
use tracing::{debug, info};

use genre_audio::Spectrogram;
use genre_domain::NUM_GENRES;

use crate::error::ModelError;
use crate::layers::{max_pool2d, relu, Conv2d, Linear};

/// Where the service and CLI look for the artifact unless configured otherwise.
pub const DEFAULT_MODEL_PATH: &str = "music_genre_model.safetensors";

pub type Logits = [f32; NUM_GENRES];

pub trait GenreModel: Send + Sync {
    fn infer(&self, spectrogram: &Spectrogram) -> Result<Logits, ModelError>;
}

/// A named parameter as stored in the model artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamTensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

pub type StateDict = BTreeMap<String, ParamTensor>;

const FLATTENED: usize = 128 * 16 * 16;
const HIDDEN: usize = 512;

/// Parameter names and shapes of the network, keyed like a PyTorch state dict.
pub const PARAMETERS: [(&str, &[usize]); 10] = [
    ("conv1.weight", &[32, 1, 3, 3]),
    ("conv1.bias", &[32]),
    ("conv2.weight", &[64, 32, 3, 3]),
    ("conv2.bias", &[64]),
    ("conv3.weight", &[128, 64, 3, 3]),
    ("conv3.bias", &[128]),
    ("fc1.weight", &[HIDDEN, FLATTENED]),
    ("fc1.bias", &[HIDDEN]),
    ("fc2.weight", &[NUM_GENRES, HIDDEN]),
    ("fc2.bias", &[NUM_GENRES]),
];

/// Three conv/ReLU/max-pool stages (1→32→64→128 channels, 128×128 → 16×16),
/// then 32768→512 with ReLU, then 512→10 logits.
///
/// Training applies dropout (p = 0.5) after the hidden layer; at inference it
/// is the identity and is therefore absent here.
#[derive(Debug, Clone)]
pub struct GenreCnn {
    conv1: Conv2d,
    conv2: Conv2d,
    conv3: Conv2d,
    fc1: Linear,
    fc2: Linear,
}

impl GenreCnn {
    /// Loads a safetensors artifact. Any mismatch with the architecture is an error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let path = path.as_ref();
        info!("loading genre model: {:?}", path);
        let bytes = std::fs::read(path)?;
        Self::from_safetensors(&bytes)
    }

    pub fn from_safetensors(bytes: &[u8]) -> Result<Self, ModelError> {
        let tensors = SafeTensors::deserialize(bytes)?;
        let mut dict = StateDict::new();
        for (name, view) in tensors.tensors() {
            if view.dtype() != Dtype::F32 {
                return Err(ModelError::DType {
                    name,
                    found: format!("{:?}", view.dtype()),
                });
            }
            let data = view
                .data()
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect();
            dict.insert(
                name,
                ParamTensor {
                    shape: view.shape().to_vec(),
                    data,
                },
            );
        }
        Self::from_state_dict(dict)
    }

    /// Strict load: every parameter must be present with its exact shape and
    /// nothing else may be.
    pub fn from_state_dict(mut dict: StateDict) -> Result<Self, ModelError> {
        let model = Self {
            conv1: conv(&mut dict, "conv1")?,
            conv2: conv(&mut dict, "conv2")?,
            conv3: conv(&mut dict, "conv3")?,
            fc1: linear(&mut dict, "fc1")?,
            fc2: linear(&mut dict, "fc2")?,
        };
        if let Some(name) = dict.into_keys().next() {
            return Err(ModelError::UnexpectedTensor(name));
        }
        Ok(model)
    }

    /// All parameters zero: every input maps to all-zero logits.
    pub fn zeroed() -> Self {
        Self {
            conv1: Conv2d::zeros(32, 1, 3),
            conv2: Conv2d::zeros(64, 32, 3),
            conv3: Conv2d::zeros(128, 64, 3),
            fc1: Linear::zeros(HIDDEN, FLATTENED),
            fc2: Linear::zeros(NUM_GENRES, HIDDEN),
        }
    }

    pub fn state_dict(&self) -> StateDict {
        let mut dict = StateDict::new();
        let convs = [("conv1", &self.conv1), ("conv2", &self.conv2), ("conv3", &self.conv3)];
        for (prefix, layer) in convs {
            dict.insert(format!("{prefix}.weight"), param(layer.weight()));
            dict.insert(format!("{prefix}.bias"), param(layer.bias()));
        }
        for (prefix, layer) in [("fc1", &self.fc1), ("fc2", &self.fc2)] {
            dict.insert(format!("{prefix}.weight"), param(layer.weight()));
            dict.insert(format!("{prefix}.bias"), param(layer.bias()));
        }
        dict
    }

    /// Encodes the parameters as a safetensors artifact readable by [`GenreCnn::load`].
    pub fn to_safetensors(&self) -> Result<Vec<u8>, ModelError> {
        let encoded: Vec<(String, Vec<usize>, Vec<u8>)> = self
            .state_dict()
            .into_iter()
            .map(|(name, tensor)| {
                let bytes = tensor.data.iter().flat_map(|v| v.to_le_bytes()).collect();
                (name, tensor.shape, bytes)
            })
            .collect();
        let views = encoded
            .iter()
            .map(|(name, shape, bytes)| -> Result<_, ModelError> {
                Ok((name.as_str(), TensorView::new(Dtype::F32, shape.clone(), bytes)?))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(safetensors::serialize(views, None)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ModelError> {
        std::fs::write(path, self.to_safetensors()?)?;
        Ok(())
    }

    fn forward(&self, input: Array3<f32>) -> Result<Array1<f32>, ModelError> {
        let x = max_pool2d(&relu(self.conv1.forward(&input)?));
        let x = max_pool2d(&relu(self.conv2.forward(&x)?));
        let x = max_pool2d(&relu(self.conv3.forward(&x)?));
        // (channel, row, column) order, as the artifact's fc1 expects
        let flat = Array1::from_iter(x.iter().copied());
        let hidden = relu(self.fc1.forward(&flat)?);
        self.fc2.forward(&hidden)
    }
}

impl GenreModel for GenreCnn {
    fn infer(&self, spectrogram: &Spectrogram) -> Result<Logits, ModelError> {
        let input = spectrogram.view().insert_axis(Axis(0)).to_owned();
        let output = self.forward(input)?;
        let mut logits = [0.0f32; NUM_GENRES];
        if output.len() != NUM_GENRES {
            return Err(ModelError::ShapeMismatch {
                name: "logits".to_string(),
                expected: vec![NUM_GENRES],
                found: vec![output.len()],
            });
        }
        for (slot, value) in logits.iter_mut().zip(output.iter()) {
            *slot = *value;
        }
        if logits.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite);
        }
        debug!(?logits, "inference complete");
        Ok(logits)
    }
}

fn expected_shape(name: &str) -> &'static [usize] {
    PARAMETERS
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, shape)| *shape)
        .unwrap_or(&[])
}

fn take(dict: &mut StateDict, name: &str) -> Result<ParamTensor, ModelError> {
    let tensor = dict
        .remove(name)
        .ok_or_else(|| ModelError::MissingTensor(name.to_string()))?;
    let expected = expected_shape(name);
    if tensor.shape != expected || tensor.data.len() != expected.iter().product::<usize>() {
        return Err(ModelError::ShapeMismatch {
            name: name.to_string(),
            expected: expected.to_vec(),
            found: tensor.shape,
        });
    }
    Ok(tensor)
}

fn conv(dict: &mut StateDict, prefix: &str) -> Result<Conv2d, ModelError> {
    let weight = take(dict, &format!("{prefix}.weight"))?;
    let bias = take(dict, &format!("{prefix}.bias"))?;
    let shape = (weight.shape[0], weight.shape[1], weight.shape[2], weight.shape[3]);
    Conv2d::new(
        Array4::from_shape_vec(shape, weight.data)?,
        Array1::from(bias.data),
    )
}

fn linear(dict: &mut StateDict, prefix: &str) -> Result<Linear, ModelError> {
    let weight = take(dict, &format!("{prefix}.weight"))?;
    let bias = take(dict, &format!("{prefix}.bias"))?;
    let shape = (weight.shape[0], weight.shape[1]);
    Linear::new(
        Array2::from_shape_vec(shape, weight.data)?,
        Array1::from(bias.data),
    )
}

fn param<D: ndarray::Dimension>(array: &ndarray::Array<f32, D>) -> ParamTensor {
    ParamTensor {
        shape: array.shape().to_vec(),
        data: array.iter().copied().collect(),
    }
}
