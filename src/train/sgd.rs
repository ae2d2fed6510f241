use crate::error::{Error, Result};

/// Hyperparameters of batched stochastic gradient ascent
#[derive(Debug, Clone)]
pub struct SgdParams {
    learning_rate: f64,
    l2: f64,
    decay: f64,
    batch_size: usize,
    max_epochs: usize,
    seed: Option<u64>,
}

impl Default for SgdParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            l2: 1e-4,
            decay: 1e-3,
            batch_size: 50,
            max_epochs: 3,
            seed: None,
        }
    }
}

impl SgdParams {
    /// Base learning rate
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn set_learning_rate(&mut self, learning_rate: f64) -> Result<()> {
        if !(learning_rate > 0.0) || !learning_rate.is_finite() {
            return Err(Error::invalid("learning_rate must be positive"));
        }
        self.learning_rate = learning_rate;
        Ok(())
    }

    /// L2 regularization strength
    pub fn l2(&self) -> f64 {
        self.l2
    }

    pub fn set_l2(&mut self, l2: f64) -> Result<()> {
        if !(l2 >= 0.0) {
            return Err(Error::invalid("l2 must be non-negative"));
        }
        self.l2 = l2;
        Ok(())
    }

    /// Learning rate decay
    pub fn decay(&self) -> f64 {
        self.decay
    }

    pub fn set_decay(&mut self, decay: f64) -> Result<()> {
        if !(decay >= 0.0) {
            return Err(Error::invalid("decay must be non-negative"));
        }
        self.decay = decay;
        Ok(())
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn set_batch_size(&mut self, batch_size: usize) -> Result<()> {
        if batch_size == 0 {
            return Err(Error::invalid("batch_size must be positive"));
        }
        self.batch_size = batch_size;
        Ok(())
    }

    pub fn max_epochs(&self) -> usize {
        self.max_epochs
    }

    pub fn set_max_epochs(&mut self, max_epochs: usize) -> Result<()> {
        if max_epochs < 1 {
            return Err(Error::invalid("max_epochs must be at least 1"));
        }
        self.max_epochs = max_epochs;
        Ok(())
    }

    /// Seed for parameter initialization and shuffling
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn set_seed(&mut self, seed: Option<u64>) {
        self.seed = seed;
    }

    /// Learning rate at step `t`: eta0 / (1 + eta0 * decay * t)
    pub fn learning_rate_at(&self, t: u64) -> f64 {
        self.learning_rate / (1.0 + self.learning_rate * self.decay * t as f64)
    }

    /// Set a parameter from its name and string value
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        match name {
            "learning_rate" => self.set_learning_rate(parse(name, value)?),
            "l2" => self.set_l2(parse(name, value)?),
            "decay" => self.set_decay(parse(name, value)?),
            "batch_size" => self.set_batch_size(parse(name, value)?),
            "max_epochs" => self.set_max_epochs(parse(name, value)?),
            "seed" => {
                self.set_seed(Some(parse(name, value)?));
                Ok(())
            }
            _ => Err(Error::invalid(format!("unknown parameter: {}", name))),
        }
    }

    /// Get a parameter value as a string
    pub fn get(&self, name: &str) -> Result<String> {
        match name {
            "learning_rate" => Ok(self.learning_rate.to_string()),
            "l2" => Ok(self.l2.to_string()),
            "decay" => Ok(self.decay.to_string()),
            "batch_size" => Ok(self.batch_size.to_string()),
            "max_epochs" => Ok(self.max_epochs.to_string()),
            "seed" => Ok(self
                .seed
                .map(|s| s.to_string())
                .unwrap_or_else(|| "none".to_string())),
            _ => Err(Error::invalid(format!("unknown parameter: {}", name))),
        }
    }
}

fn parse<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::invalid(format!("invalid value for {}: {}", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = SgdParams::default();
        assert_eq!(params.learning_rate(), 0.1);
        assert_eq!(params.batch_size(), 50);
        assert_eq!(params.seed(), None);
        assert_eq!(params.get("seed").unwrap(), "none");
    }

    #[test]
    fn test_learning_rate_schedule() {
        let mut params = SgdParams::default();
        params.set_learning_rate(0.5).unwrap();
        params.set_decay(0.1).unwrap();
        assert_eq!(params.learning_rate_at(0), 0.5);
        assert!((params.learning_rate_at(4) - 0.5 / 1.2).abs() < 1e-12);
    }

    #[test]
    fn test_set_by_name() {
        let mut params = SgdParams::default();
        params.set("l2", "0.01").unwrap();
        params.set("batch_size", "8").unwrap();
        params.set("seed", "3").unwrap();
        assert_eq!(params.l2(), 0.01);
        assert_eq!(params.get("batch_size").unwrap(), "8");
        assert_eq!(params.seed(), Some(3));
        assert!(params.set("batch_size", "-1").is_err());
        assert!(params.set("learning_rate", "NaN").is_err());
    }
}
