//! Stacked LSTM sequence regressor
//!
//! Rows of the feature frame are read as consecutive time steps. Every run
//! of `window` rows is one input sequence and the target right after it is
//! the label, so a frame of `n` rows yields `n - window` predictions aligned
//! with targets `window..n`.
//!
//! The network stacks three LSTM layers of `units`, `units / 2` and
//! `units / 4` hidden units, each followed by dropout, and reads the last
//! hidden state through one linear unit. Training uses RMSprop on shuffled
//! mini-batches with early stopping and learning-rate decay on plateaus of
//! the validation loss.

use crate::error::{ForecastError, Result};
use crate::models::{check_training_data, FeatureFrame, FittedRegressor, Regressor};
use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};
use burn::module::AutodiffModule;
use burn::nn::loss::{MseLoss, Reduction};
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig, Lstm, LstmConfig as LstmLayerConfig};
use burn::optim::{GradientsParams, Optimizer, RmsPropConfig};
use burn::prelude::*;
use burn::tensor::ElementConversion;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

type TrainBackend = Autodiff<NdArray>;
type InferBackend = NdArray;

/// Windows evaluated per forward pass at prediction time
const PREDICT_BATCH: usize = 256;

/// LSTM hyperparameters and training schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LstmConfig {
    /// Hidden units of the first layer
    pub units: usize,
    /// Dropout probability after each recurrent layer
    pub dropout: f64,
    /// Initial RMSprop learning rate
    pub learning_rate: f64,
    /// Mini-batch size
    pub batch_size: usize,
    /// Time steps per input sequence
    pub window: usize,
    /// Epoch budget
    pub epochs: usize,
    /// Trailing share of the training sequences held out for validation
    pub validation_fraction: f64,
    /// Epochs without improvement before training stops
    pub early_stopping_patience: usize,
    /// Epochs without improvement before the learning rate is cut
    pub plateau_patience: usize,
    /// Learning-rate multiplier on a plateau
    pub plateau_factor: f64,
    /// Learning-rate floor
    pub min_learning_rate: f64,
    /// Seed of weight initialisation and batch shuffling
    pub seed: u64,
}

impl Default for LstmConfig {
    fn default() -> Self {
        Self {
            units: 100,
            dropout: 0.2,
            learning_rate: 1e-3,
            batch_size: 16,
            window: 30,
            epochs: 100,
            validation_fraction: 0.2,
            early_stopping_patience: 10,
            plateau_patience: 5,
            plateau_factor: 0.5,
            min_learning_rate: 1e-5,
            seed: 42,
        }
    }
}

impl LstmConfig {
    pub fn validate(&self) -> Result<()> {
        if self.units == 0 || self.batch_size == 0 || self.window == 0 || self.epochs == 0 {
            return Err(ForecastError::InvalidParameter(
                "LSTM units, batch size, window and epochs must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ForecastError::InvalidParameter(format!(
                "Dropout must lie in [0, 1), got {}",
                self.dropout
            )));
        }
        if !(self.learning_rate > 0.0) || !(self.min_learning_rate > 0.0) {
            return Err(ForecastError::InvalidParameter(
                "Learning rates must be positive".to_string(),
            ));
        }
        if !(self.validation_fraction > 0.0 && self.validation_fraction < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "Validation fraction must lie strictly between 0 and 1, got {}",
                self.validation_fraction
            )));
        }
        if !(self.plateau_factor > 0.0 && self.plateau_factor < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "Plateau factor must lie strictly between 0 and 1, got {}",
                self.plateau_factor
            )));
        }
        Ok(())
    }

    /// Hidden units of the three recurrent layers
    pub fn layer_widths(&self) -> [usize; 3] {
        [
            self.units.max(1),
            (self.units / 2).max(1),
            (self.units / 4).max(1),
        ]
    }
}

impl fmt::Display for LstmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "units={}, dropout={:.3}, learning_rate={:.5}, batch_size={}",
            self.units, self.dropout, self.learning_rate, self.batch_size
        )
    }
}

#[derive(Module, Debug)]
pub struct LstmNetwork<B: Backend> {
    lstm1: Lstm<B>,
    lstm2: Lstm<B>,
    lstm3: Lstm<B>,
    dropout: Dropout,
    head: Linear<B>,
}

impl<B: Backend> LstmNetwork<B> {
    fn init(channels: usize, config: &LstmConfig, device: &B::Device) -> Self {
        let [w1, w2, w3] = config.layer_widths();
        Self {
            lstm1: LstmLayerConfig::new(channels, w1, true).init(device),
            lstm2: LstmLayerConfig::new(w1, w2, true).init(device),
            lstm3: LstmLayerConfig::new(w2, w3, true).init(device),
            dropout: DropoutConfig::new(config.dropout).init(),
            head: LinearConfig::new(w3, 1).init(device),
        }
    }

    /// `[batch, window, channels]` sequences to `[batch, 1]` predictions
    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 2> {
        let (x, _) = self.lstm1.forward(input, None);
        let x = self.dropout.forward(x);
        let (x, _) = self.lstm2.forward(x, None);
        let x = self.dropout.forward(x);
        let (x, _) = self.lstm3.forward(x, None);
        let [batch, steps, hidden] = x.dims();
        let last = x
            .slice([0..batch, steps - 1..steps, 0..hidden])
            .reshape([batch, hidden]);
        let last = self.dropout.forward(last);
        self.head.forward(last)
    }
}

/// Overlapping input sequences with their labels
struct Windows {
    inputs: Vec<Vec<f32>>,
    labels: Vec<f32>,
    window: usize,
    channels: usize,
}

impl Windows {
    fn build(rows: &[Vec<f64>], targets: &[f64], window: usize) -> Result<Self> {
        if rows.len() <= window {
            return Err(ForecastError::DataError(format!(
                "A window of {} steps needs more than {} rows, have {}",
                window,
                window,
                rows.len()
            )));
        }
        let channels = rows.first().map(Vec::len).unwrap_or(0);
        let count = rows.len() - window;
        let inputs = (0..count)
            .map(|i| {
                rows[i..i + window]
                    .iter()
                    .flat_map(|row| row.iter().map(|v| *v as f32))
                    .collect()
            })
            .collect();
        let labels = targets[window..].iter().map(|v| *v as f32).collect();
        Ok(Self {
            inputs,
            labels,
            window,
            channels,
        })
    }

    fn len(&self) -> usize {
        self.inputs.len()
    }

    /// Split off the trailing `fraction` of the windows
    fn split_tail(mut self, fraction: f64) -> Result<(Self, Self)> {
        let n = self.len();
        let n_train = (n as f64 * (1.0 - fraction)).floor() as usize;
        if n_train == 0 || n_train >= n {
            return Err(ForecastError::DataError(format!(
                "{} training sequences cannot be split for validation at fraction {}",
                n, fraction
            )));
        }
        let tail = Self {
            inputs: self.inputs.split_off(n_train),
            labels: self.labels.split_off(n_train),
            window: self.window,
            channels: self.channels,
        };
        Ok((self, tail))
    }

    fn inputs<B: Backend>(&self, indices: &[usize], device: &B::Device) -> Tensor<B, 3> {
        let values: Vec<f32> = indices
            .iter()
            .flat_map(|&i| self.inputs[i].iter().copied())
            .collect();
        Tensor::from_data(
            TensorData::new(values, [indices.len(), self.window, self.channels]),
            device,
        )
    }

    fn labels<B: Backend>(&self, indices: &[usize], device: &B::Device) -> Tensor<B, 2> {
        let values: Vec<f32> = indices.iter().map(|&i| self.labels[i]).collect();
        Tensor::from_data(TensorData::new(values, [indices.len(), 1]), device)
    }
}

/// Per-epoch record of a training run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingHistory {
    pub train_loss: Vec<f64>,
    pub validation_loss: Vec<f64>,
    pub learning_rates: Vec<f64>,
    /// Epoch whose weights were kept, counted from 1
    pub best_epoch: usize,
}

impl TrainingHistory {
    /// Lowest validation loss seen
    pub fn best_validation_loss(&self) -> Option<f64> {
        self.validation_loss.iter().copied().reduce(f64::min)
    }

    /// Number of epochs actually run
    pub fn epochs_run(&self) -> usize {
        self.train_loss.len()
    }
}

/// Mean validation loss of `model` over every window
fn validation_loss(
    model: &LstmNetwork<InferBackend>,
    windows: &Windows,
    device: &NdArrayDevice,
) -> Result<f64> {
    let indices: Vec<usize> = (0..windows.len()).collect();
    let mut sum = 0.0;
    for chunk in indices.chunks(PREDICT_BATCH) {
        let predictions = model.forward(windows.inputs::<InferBackend>(chunk, device));
        let loss = MseLoss::new().forward(
            predictions,
            windows.labels::<InferBackend>(chunk, device),
            Reduction::Mean,
        );
        sum += loss.into_scalar().elem::<f64>() * chunk.len() as f64;
    }
    Ok(sum / windows.len() as f64)
}

/// What an epoch's validation loss means for training
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EpochOutcome {
    /// New best loss; keep these weights
    Improved,
    Plateau,
    /// Patience exhausted
    Stop,
}

/// Early stopping and plateau learning-rate decay on the validation loss
#[derive(Debug, Clone)]
struct Schedule {
    learning_rate: f64,
    best_loss: f64,
    since_best: usize,
    since_decay: usize,
    plateau_patience: usize,
    plateau_factor: f64,
    min_learning_rate: f64,
    early_stopping_patience: usize,
}

impl Schedule {
    fn new(config: &LstmConfig) -> Self {
        Self {
            learning_rate: config.learning_rate,
            best_loss: f64::INFINITY,
            since_best: 0,
            since_decay: 0,
            plateau_patience: config.plateau_patience,
            plateau_factor: config.plateau_factor,
            min_learning_rate: config.min_learning_rate,
            early_stopping_patience: config.early_stopping_patience,
        }
    }

    /// Rate for the next epoch
    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn best_loss(&self) -> f64 {
        self.best_loss
    }

    fn observe(&mut self, val_loss: f64) -> EpochOutcome {
        if val_loss < self.best_loss {
            self.best_loss = val_loss;
            self.since_best = 0;
            self.since_decay = 0;
            return EpochOutcome::Improved;
        }

        self.since_best += 1;
        self.since_decay += 1;
        if self.since_decay >= self.plateau_patience {
            let reduced = (self.learning_rate * self.plateau_factor).max(self.min_learning_rate);
            if reduced < self.learning_rate {
                debug!(from = self.learning_rate, to = reduced, "reducing learning rate");
                self.learning_rate = reduced;
            }
            self.since_decay = 0;
        }
        if self.since_best >= self.early_stopping_patience {
            EpochOutcome::Stop
        } else {
            EpochOutcome::Plateau
        }
    }
}

/// Stacked LSTM strategy
#[derive(Debug, Clone)]
pub struct LstmRegressor {
    config: LstmConfig,
}

impl LstmRegressor {
    /// Create a new LSTM strategy
    pub fn new(config: LstmConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Get the configuration
    pub fn config(&self) -> &LstmConfig {
        &self.config
    }

    fn train(
        &self,
        train: &Windows,
        validation: &Windows,
        device: &NdArrayDevice,
    ) -> Result<(LstmNetwork<TrainBackend>, TrainingHistory)> {
        let config = &self.config;
        TrainBackend::seed(config.seed);
        let mut model: LstmNetwork<TrainBackend> = LstmNetwork::init(train.channels, config, device);
        let mut optim = RmsPropConfig::new()
            .with_alpha(0.9)
            .with_epsilon(1e-7)
            .init();
        let mut rng = StdRng::seed_from_u64(config.seed);

        let mut history = TrainingHistory::default();
        let mut schedule = Schedule::new(config);
        let mut best_model = model.clone();
        let mut order: Vec<usize> = (0..train.len()).collect();

        for epoch in 1..=config.epochs {
            order.shuffle(&mut rng);
            let learning_rate = schedule.learning_rate();
            let mut loss_sum = 0.0;
            let mut batches = 0;

            for chunk in order.chunks(config.batch_size) {
                let predictions = model.forward(train.inputs::<TrainBackend>(chunk, device));
                let loss = MseLoss::new().forward(
                    predictions,
                    train.labels::<TrainBackend>(chunk, device),
                    Reduction::Mean,
                );
                let loss_value = loss.clone().into_scalar().elem::<f64>();
                if !loss_value.is_finite() {
                    return Err(ForecastError::FitError(format!(
                        "LSTM training loss diverged in epoch {} ({})",
                        epoch, config
                    )));
                }
                loss_sum += loss_value;
                batches += 1;

                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model = optim.step(learning_rate, model, grads);
            }

            let val_loss = validation_loss(&model.valid(), validation, device)?;
            history.train_loss.push(loss_sum / batches.max(1) as f64);
            history.validation_loss.push(val_loss);
            history.learning_rates.push(learning_rate);
            debug!(epoch, train_loss = loss_sum / batches.max(1) as f64, val_loss, learning_rate, "lstm epoch");

            match schedule.observe(val_loss) {
                EpochOutcome::Improved => {
                    best_model = model.clone();
                    history.best_epoch = epoch;
                }
                EpochOutcome::Plateau => {}
                EpochOutcome::Stop => {
                    debug!(epoch, best_epoch = history.best_epoch, "early stopping");
                    break;
                }
            }
        }

        if !schedule.best_loss().is_finite() {
            return Err(ForecastError::FitError(format!(
                "LSTM validation loss never became finite ({})",
                config
            )));
        }
        Ok((best_model, history))
    }
}

/// A trained network and the channels it reads
#[derive(Debug)]
pub struct FittedLstm {
    columns: Vec<String>,
    window: usize,
    model: LstmNetwork<InferBackend>,
    device: NdArrayDevice,
    history: TrainingHistory,
}

impl FittedLstm {
    /// Training record of the run that produced this model
    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }

    /// Time steps per input sequence
    pub fn window(&self) -> usize {
        self.window
    }
}

impl Regressor for LstmRegressor {
    type Fitted = FittedLstm;

    fn name(&self) -> &str {
        "lstm"
    }

    fn fit(&self, x: &FeatureFrame, y: &[f64]) -> Result<FittedLstm> {
        check_training_data(x, y)?;
        if x.width() == 0 {
            return Err(ForecastError::DataError(
                "An LSTM needs at least one input channel".to_string(),
            ));
        }
        let windows = Windows::build(x.rows(), y, self.config.window)?;
        let (train, validation) = windows.split_tail(self.config.validation_fraction)?;
        let device = NdArrayDevice::default();

        let (model, history) = self.train(&train, &validation, &device)?;
        info!(
            config = %self.config,
            epochs = history.epochs_run(),
            best_epoch = history.best_epoch,
            val_loss = history.best_validation_loss().unwrap_or(f64::NAN),
            "trained lstm"
        );

        Ok(FittedLstm {
            columns: x.columns().to_vec(),
            window: self.config.window,
            model: model.valid(),
            device,
            history,
        })
    }
}

impl FittedRegressor for FittedLstm {
    /// One prediction per row after the first `window` rows
    fn predict(&self, x: &FeatureFrame) -> Result<Vec<f64>> {
        if x.columns() != self.columns.as_slice() {
            return Err(ForecastError::ValidationError(format!(
                "LSTM was trained on [{}] but asked to predict from [{}]",
                self.columns.join(", "),
                x.columns().join(", ")
            )));
        }
        let placeholder = vec![0.0; x.len()];
        let windows = Windows::build(x.rows(), &placeholder, self.window)?;
        let indices: Vec<usize> = (0..windows.len()).collect();

        let mut predictions = Vec::with_capacity(windows.len());
        for chunk in indices.chunks(PREDICT_BATCH) {
            let output = self
                .model
                .forward(windows.inputs::<InferBackend>(chunk, &self.device));
            let values = output
                .into_data()
                .to_vec::<f32>()
                .map_err(|e| ForecastError::FitError(format!("Reading LSTM output: {:?}", e)))?;
            predictions.extend(values.into_iter().map(f64::from));
        }

        if predictions.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::FitError(
                "LSTM produced non-finite predictions".to_string(),
            ));
        }
        Ok(predictions)
    }
}
