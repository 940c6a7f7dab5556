// Classifier boundary - external clap probability model
//
// The neural model is a black box that maps the long waveform window to a
// clap probability. The pipeline owns the classifier and calls it through
// `&mut self`, so at most one inference is ever in flight.

use crate::error::ClassifierError;

/// Waveform → clap probability
pub trait ClapClassifier: Send {
    /// Number of samples the model expects
    fn input_len(&self) -> usize;

    /// Probability in [0, 1] that the window contains a clap
    fn classify(&mut self, waveform: &[f32]) -> Result<f32, ClassifierError>;
}

/// Check the input shape before handing a window to the model
pub fn check_input(classifier: &dyn ClapClassifier, waveform: &[f32]) -> Result<(), ClassifierError> {
    let expected = classifier.input_len();
    if waveform.len() != expected {
        return Err(ClassifierError::ShapeMismatch {
            expected,
            actual: waveform.len(),
        });
    }
    Ok(())
}

/// Reject NaN, infinities and values outside [0, 1]
pub fn check_output(probability: f32) -> Result<f32, ClassifierError> {
    if probability.is_finite() && (0.0..=1.0).contains(&probability) {
        Ok(probability)
    } else {
        Err(ClassifierError::InvalidOutput { value: probability })
    }
}

/// Returns the same score for every window
///
/// With a score above the confidence threshold the gate alone decides.
#[derive(Debug, Clone)]
pub struct FixedProbabilityClassifier {
    input_len: usize,
    probability: f32,
    calls: u64,
}

impl FixedProbabilityClassifier {
    pub fn new(input_len: usize, probability: f32) -> Self {
        Self {
            input_len,
            probability,
            calls: 0,
        }
    }

    /// Number of inferences served
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl ClapClassifier for FixedProbabilityClassifier {
    fn input_len(&self) -> usize {
        self.input_len
    }

    fn classify(&mut self, _waveform: &[f32]) -> Result<f32, ClassifierError> {
        self.calls += 1;
        Ok(self.probability)
    }
}

/// Adapts a closure into a classifier
pub struct FnClassifier<F>
where
    F: FnMut(&[f32]) -> Result<f32, ClassifierError> + Send,
{
    input_len: usize,
    func: F,
}

impl<F> FnClassifier<F>
where
    F: FnMut(&[f32]) -> Result<f32, ClassifierError> + Send,
{
    pub fn new(input_len: usize, func: F) -> Self {
        Self { input_len, func }
    }
}

impl<F> ClapClassifier for FnClassifier<F>
where
    F: FnMut(&[f32]) -> Result<f32, ClassifierError> + Send,
{
    fn input_len(&self) -> usize {
        self.input_len
    }

    fn classify(&mut self, waveform: &[f32]) -> Result<f32, ClassifierError> {
        (self.func)(waveform)
    }
}

impl ClapClassifier for Box<dyn ClapClassifier> {
    fn input_len(&self) -> usize {
        self.as_ref().input_len()
    }

    fn classify(&mut self, waveform: &[f32]) -> Result<f32, ClassifierError> {
        self.as_mut().classify(waveform)
    }
}
