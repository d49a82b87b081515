use serde::{Deserialize, Serialize};

/// Body of `POST /predict/encoded`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodedPredictRequest {
    /// Codec string: base64 of the compressed bit grid
    pub image: String,
    /// Whether the string carries a trailing label byte
    #[serde(default)]
    pub labeled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labeled_defaults_to_false() {
        let request: EncodedPredictRequest = serde_json::from_str(r#"{"image": "eJw="}"#).unwrap();
        assert_eq!(request.image, "eJw=");
        assert!(!request.labeled);
    }
}
