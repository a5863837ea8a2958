use ndarray::{s, Array1, Array2, Array3, Array4, Axis};

use crate::error::ModelError;

/// 2-D convolution, stride 1, zero padding that preserves the spatial size.
#[derive(Debug, Clone)]
pub struct Conv2d {
    weight: Array4<f32>,
    bias: Array1<f32>,
}

impl Conv2d {
    /// `weight` is `(out_channels, in_channels, k, k)` with odd `k`.
    pub fn new(weight: Array4<f32>, bias: Array1<f32>) -> Result<Self, ModelError> {
        let (out_channels, _, kh, kw) = weight.dim();
        if bias.len() != out_channels || kh != kw || kh % 2 == 0 {
            return Err(ModelError::ShapeMismatch {
                name: "conv".to_string(),
                expected: vec![out_channels, kh, kh],
                found: vec![bias.len(), kh, kw],
            });
        }
        Ok(Self {
            weight: weight.as_standard_layout().into_owned(),
            bias,
        })
    }

    pub fn zeros(out_channels: usize, in_channels: usize, kernel: usize) -> Self {
        Self {
            weight: Array4::zeros((out_channels, in_channels, kernel, kernel)),
            bias: Array1::zeros(out_channels),
        }
    }

    pub fn weight(&self) -> &Array4<f32> {
        &self.weight
    }

    pub fn bias(&self) -> &Array1<f32> {
        &self.bias
    }

    /// `input` is `(in_channels, height, width)`.
    pub fn forward(&self, input: &Array3<f32>) -> Result<Array3<f32>, ModelError> {
        let (out_channels, in_channels, k, _) = self.weight.dim();
        let (channels, height, width) = input.dim();
        if channels != in_channels {
            return Err(ModelError::ShapeMismatch {
                name: "conv input".to_string(),
                expected: vec![in_channels, height, width],
                found: vec![channels, height, width],
            });
        }
        let pad = (k / 2) as isize;

        // im2col: one row per (channel, ky, kx), one column per output pixel
        let mut columns = Array2::<f32>::zeros((in_channels * k * k, height * width));
        for c in 0..in_channels {
            for ky in 0..k {
                let dy = ky as isize - pad;
                let y0 = (-dy).max(0) as usize;
                let y1 = (height as isize - dy).min(height as isize) as usize;
                for kx in 0..k {
                    let dx = kx as isize - pad;
                    let x0 = (-dx).max(0) as usize;
                    let x1 = (width as isize - dx).min(width as isize) as usize;
                    if y0 >= y1 || x0 >= x1 {
                        continue;
                    }
                    let row = (c * k + ky) * k + kx;
                    let mut plane = columns.row_mut(row).into_shape((height, width))?;
                    let src = input.slice(s![
                        c,
                        (y0 as isize + dy) as usize..(y1 as isize + dy) as usize,
                        (x0 as isize + dx) as usize..(x1 as isize + dx) as usize
                    ]);
                    plane.slice_mut(s![y0..y1, x0..x1]).assign(&src);
                }
            }
        }

        let kernel = self
            .weight
            .view()
            .into_shape((out_channels, in_channels * k * k))?;
        let mut output = kernel.dot(&columns);
        output += &self.bias.view().insert_axis(Axis(1));
        Ok(output.into_shape((out_channels, height, width))?)
    }
}

/// Fully connected layer, `weight` is `(out_features, in_features)`.
#[derive(Debug, Clone)]
pub struct Linear {
    weight: Array2<f32>,
    bias: Array1<f32>,
}

impl Linear {
    pub fn new(weight: Array2<f32>, bias: Array1<f32>) -> Result<Self, ModelError> {
        if bias.len() != weight.nrows() {
            return Err(ModelError::ShapeMismatch {
                name: "linear".to_string(),
                expected: vec![weight.nrows()],
                found: vec![bias.len()],
            });
        }
        Ok(Self { weight, bias })
    }

    pub fn zeros(out_features: usize, in_features: usize) -> Self {
        Self {
            weight: Array2::zeros((out_features, in_features)),
            bias: Array1::zeros(out_features),
        }
    }

    pub fn weight(&self) -> &Array2<f32> {
        &self.weight
    }

    pub fn bias(&self) -> &Array1<f32> {
        &self.bias
    }

    pub fn forward(&self, input: &Array1<f32>) -> Result<Array1<f32>, ModelError> {
        if input.len() != self.weight.ncols() {
            return Err(ModelError::ShapeMismatch {
                name: "linear input".to_string(),
                expected: vec![self.weight.ncols()],
                found: vec![input.len()],
            });
        }
        Ok(self.weight.dot(input) + &self.bias)
    }
}

pub fn relu<D: ndarray::Dimension>(mut input: ndarray::Array<f32, D>) -> ndarray::Array<f32, D> {
    input.mapv_inplace(|value| value.max(0.0));
    input
}

/// 2x2 max pooling with stride 2; odd trailing rows and columns are dropped.
pub fn max_pool2d(input: &Array3<f32>) -> Array3<f32> {
    let (channels, height, width) = input.dim();
    Array3::from_shape_fn((channels, height / 2, width / 2), |(c, y, x)| {
        let (y, x) = (2 * y, 2 * x);
        input[[c, y, x]]
            .max(input[[c, y, x + 1]])
            .max(input[[c, y + 1, x]])
            .max(input[[c, y + 1, x + 1]])
    })
}
