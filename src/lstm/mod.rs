/*!
The LSTM model: stacked LSTM layers over a window of normalized closing prices, followed by two linear layers
*/

use crate::data::window::TrainingSet;
use crate::predict::Predictor;
use crate::{CpuFloat, Error, GpuFloat, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::Path;
use tch::nn::{self, Linear, Module, OptimizerConfig, RNNConfig, VarStore, LSTM, RNN};
use tch::{Device, Reduction, Tensor};
use tracing::{debug, info};

/// The StockLSTM model
#[derive(Debug)]
pub struct StockLSTM {
    /// This model's LSTM layers
    pub lstm_layer: LSTM,
    /// This model's hidden linear layer
    pub hidden_layer: Linear,
    /// This model's output layer
    pub output_layer: Linear,
}

impl StockLSTM {
    /// Map a `[batch, window, 1]` tensor of sequences to a `[batch, 1]` tensor of next values
    pub fn forward(&self, xs: &Tensor) -> Tensor {
        let (output, _state) = self.lstm_layer.seq(xs);
        // Only the last step's hidden state feeds the dense layers
        let last = output.select(1, -1);
        self.output_layer.forward(&self.hidden_layer.forward(&last))
    }

    /// Compute the mean squared error on a batch of inputs and targets
    pub fn loss(&self, xs: &Tensor, ys: &Tensor) -> Tensor {
        self.forward(xs).mse_loss(ys, Reduction::Mean)
    }
}

/// A descriptor for an instance of the StockLSTM model
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct StockLSTMDesc {
    /// The size of the hidden LSTM layers to use
    pub hidden: usize,
    /// The number of hidden LSTM layers to use
    pub layers: usize,
    /// The width of the linear layer between the LSTM and the output
    pub dense: usize,
}

impl Default for StockLSTMDesc {
    fn default() -> StockLSTMDesc {
        StockLSTMDesc {
            hidden: 50,
            layers: 2,
            dense: 25,
        }
    }
}

impl StockLSTMDesc {
    /// Build a `StockLSTM` over a given `VarStore`
    pub fn build(&self, vs: &VarStore) -> StockLSTM {
        let root = vs.root();
        let lstm_layer = nn::lstm(
            &root / "lstm",
            1,
            self.hidden as i64,
            RNNConfig {
                num_layers: self.layers as i64,
                batch_first: true,
                ..Default::default()
            },
        );
        let hidden_layer = nn::linear(
            &root / "dense",
            self.hidden as i64,
            self.dense as i64,
            Default::default(),
        );
        let output_layer = nn::linear(&root / "output", self.dense as i64, 1, Default::default());
        StockLSTM {
            lstm_layer,
            hidden_layer,
            output_layer,
        }
    }

    /// Train a fresh model on a training set, calling `on_epoch` after every full pass
    pub fn train<E>(
        &self,
        set: &TrainingSet,
        config: &TrainConfig,
        device: Device,
        mut on_epoch: E,
    ) -> Result<LstmPredictor>
    where
        E: FnMut(&EpochStats),
    {
        if set.is_empty() {
            return Err(Error::domain("cannot train on an empty training set"));
        }
        if config.batch_size == 0 {
            return Err(Error::Validation("batch size must be at least 1".into()));
        }
        if let Some(seed) = config.seed {
            tch::manual_seed(seed as i64);
        }
        let vs = VarStore::new(device);
        let model = self.build(&vs);
        let mut opt = nn::Adam::default().build(&vs, config.learning_rate)?;
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut order: Vec<usize> = (0..set.len()).collect();

        info!(
            "Training on {} windows of {} for {} epochs, batch size {}",
            set.len(),
            set.window,
            config.epochs,
            config.batch_size
        );
        for epoch in 0..config.epochs {
            order.shuffle(&mut rng);
            let mut sum_loss = 0.0;
            let mut max_loss = -f64::INFINITY;
            let mut batches = 0;
            for indices in order.chunks(config.batch_size) {
                let (xs, ys) = make_batch(set, indices);
                let loss = model.loss(&xs.to_device(device), &ys.to_device(device));
                opt.backward_step(&loss);
                let loss = loss.double_value(&[]);
                sum_loss += loss;
                max_loss = max_loss.max(loss);
                batches += 1;
            }
            let stats = EpochStats {
                epoch,
                mean_loss: sum_loss / batches as f64,
                max_loss,
                batches,
            };
            debug!("{:?}", stats);
            on_epoch(&stats);
        }

        Ok(LstmPredictor {
            desc: self.clone(),
            vs,
            model,
        })
    }
}

/// Training hyperparameters
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    /// The number of full passes over the training set
    pub epochs: usize,
    /// The number of windows per gradient update
    pub batch_size: usize,
    /// Adam's learning rate
    pub learning_rate: f64,
    /// Seeds weight initialization and shuffling, for reproducible runs
    pub seed: Option<u64>,
}

impl Default for TrainConfig {
    fn default() -> TrainConfig {
        TrainConfig {
            epochs: 10,
            batch_size: 1,
            learning_rate: 1e-3,
            seed: None,
        }
    }
}

/// Losses over one epoch of training
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct EpochStats {
    /// The epoch, counting from zero
    pub epoch: usize,
    /// The average batch loss
    pub mean_loss: f64,
    /// The worst batch loss
    pub max_loss: f64,
    /// The number of batches
    pub batches: usize,
}

/// Package the samples at `indices` as `[batch, window, 1]` inputs and `[batch, 1]` targets
pub fn make_batch(set: &TrainingSet, indices: &[usize]) -> (Tensor, Tensor) {
    let mut input = Vec::<GpuFloat>::with_capacity(indices.len() * set.window);
    let mut output = Vec::<GpuFloat>::with_capacity(indices.len());
    for &i in indices {
        let sample = &set.samples[i];
        input.extend(sample.input.iter().map(|&v| v as GpuFloat));
        output.push(sample.target as GpuFloat);
    }
    let input = Tensor::from_slice(&input).view([indices.len() as i64, set.window as i64, 1]);
    let output = Tensor::from_slice(&output).view([indices.len() as i64, 1]);
    (input, output)
}

/// A trained StockLSTM, ready for inference
pub struct LstmPredictor {
    /// The shape of the model
    pub desc: StockLSTMDesc,
    vs: VarStore,
    model: StockLSTM,
}

impl std::fmt::Debug for LstmPredictor {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("LstmPredictor")
            .field("desc", &self.desc)
            .field("device", &self.device())
            .finish()
    }
}

impl LstmPredictor {
    /// Write the model's weights to `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.vs.save(path)?;
        Ok(())
    }

    /// Load weights written by [`LstmPredictor::save`] into a model of shape `desc`
    pub fn load<P: AsRef<Path>>(desc: &StockLSTMDesc, path: P, device: Device) -> Result<LstmPredictor> {
        let mut vs = VarStore::new(device);
        let model = desc.build(&vs);
        vs.load(path)?;
        vs.freeze();
        Ok(LstmPredictor {
            desc: desc.clone(),
            vs,
            model,
        })
    }

    /// The device this model lives on
    pub fn device(&self) -> Device {
        self.vs.device()
    }
}

impl Predictor for LstmPredictor {
    fn predict(&self, window: &[CpuFloat]) -> Result<CpuFloat> {
        if window.is_empty() {
            return Err(Error::domain("cannot predict from an empty window"));
        }
        let input: Vec<GpuFloat> = window.iter().map(|&v| v as GpuFloat).collect();
        let xs = Tensor::from_slice(&input)
            .view([1, window.len() as i64, 1])
            .to_device(self.device());
        let ys = tch::no_grad(|| self.model.forward(&xs));
        Ok(ys.double_value(&[0, 0]))
    }
}
