/// A named real value: one feature of an edge, or one weight of the model
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Feature name
    pub name: String,
    pub value: f64,
}

impl Attribute {
    pub fn new<T: Into<String>>(name: T, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// `(name, value)` pairs, as collected into a `FeatureMap`
impl<S: Into<String>> From<(S, f64)> for Attribute {
    fn from((name, value): (S, f64)) -> Self {
        Self::new(name, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_from_pair() {
        let attr = Attribute::from(("target-len", -1.0));
        assert_eq!(attr, Attribute::new("target-len", -1.0));

        let owned = Attribute::from((String::from("trans:the/le"), 0.5));
        assert_eq!(owned.name, "trans:the/le");
        assert_eq!(owned.value, 0.5);
    }
}
