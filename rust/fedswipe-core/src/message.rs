//! JSON messages exchanged between the coordinator and the clients.
//!
//! All messages are JSON objects with camel-cased field names. Encoded weights travel as a
//! base64 string (`data`) next to their manifest (`specs`).

use serde::{Deserialize, Serialize};

use crate::{
    codec::{DecodeError, EncodedWeights, WeightSpec},
    common::ModelVersion,
};

/// A client's submission of locally trained parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMessage {
    /// The base64 encoded weights blob.
    pub data: String,
    /// The manifest of the blob.
    pub specs: Vec<WeightSpec>,
    /// The global model version the client started training from.
    pub model_version: ModelVersion,
    /// The number of local samples the weights were trained on.
    pub samples_used: u32,
}

impl UpdateMessage {
    pub fn new(weights: EncodedWeights, model_version: ModelVersion, samples_used: u32) -> Self {
        Self {
            data: base64::encode(&weights.data),
            specs: weights.specs,
            model_version,
            samples_used,
        }
    }

    /// Parses a message from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self, DecodeError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Extracts the encoded weights.
    ///
    /// # Errors
    /// Fails if `data` isn't valid base64.
    pub fn weights(&self) -> Result<EncodedWeights, DecodeError> {
        Ok(EncodedWeights {
            data: base64::decode(&self.data)?,
            specs: self.specs.clone(),
        })
    }
}

/// The global model as pushed to the clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelMessage {
    /// The base64 encoded weights blob.
    pub data: String,
    /// The manifest of the blob.
    pub specs: Vec<WeightSpec>,
    /// The version of the global model.
    pub model_version: ModelVersion,
    /// The number of clients connected when the message was created.
    pub latest_client_count: usize,
}

impl ModelMessage {
    pub fn new(weights: EncodedWeights, model_version: ModelVersion, client_count: usize) -> Self {
        Self {
            data: base64::encode(&weights.data),
            specs: weights.specs,
            model_version,
            latest_client_count: client_count,
        }
    }

    /// Extracts the encoded weights.
    pub fn weights(&self) -> Result<EncodedWeights, DecodeError> {
        Ok(EncodedWeights {
            data: base64::decode(&self.data)?,
            specs: self.specs.clone(),
        })
    }
}

/// The answer to a submission that was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionMessage {
    pub error: String,
}

impl RejectionMessage {
    pub fn new(error: impl ToString) -> Self {
        Self {
            error: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::codec::DType;

    #[test]
    fn test_parse_update_message() {
        let data = base64::encode(&[0, 0, 128, 63]);
        let raw = json!({
            "data": data,
            "specs": [{ "name": "w", "shape": [1], "dtype": "float32" }],
            "modelVersion": 3,
            "samplesUsed": 5,
        })
        .to_string();

        let message = UpdateMessage::from_json(&raw).unwrap();
        assert_eq!(message.model_version, 3);
        assert_eq!(message.samples_used, 5);
        let weights = message.weights().unwrap();
        assert_eq!(weights.data, vec![0, 0, 128, 63]);
        assert_eq!(weights.specs[0].dtype, DType::Float32);
    }

    #[test]
    fn test_parse_update_message_errors() {
        assert!(matches!(
            UpdateMessage::from_json("{\"data\": \"\"}"),
            Err(DecodeError::Json(_))
        ));

        let unknown_dtype = json!({
            "data": "",
            "specs": [{ "name": "w", "shape": [1], "dtype": "int32" }],
            "modelVersion": 1,
            "samplesUsed": 1,
        })
        .to_string();
        assert!(UpdateMessage::from_json(&unknown_dtype).is_err());

        let message = UpdateMessage {
            data: "not base64!".to_string(),
            specs: Vec::new(),
            model_version: 1,
            samples_used: 1,
        };
        assert!(matches!(message.weights(), Err(DecodeError::Base64(_))));
    }

    #[test]
    fn test_model_message_fields() {
        let weights = EncodedWeights {
            data: vec![1, 2, 3, 4],
            specs: Vec::new(),
        };
        let value = serde_json::to_value(ModelMessage::new(weights, 2, 3)).unwrap();
        assert_eq!(value["modelVersion"], 2);
        assert_eq!(value["latestClientCount"], 3);
        assert_eq!(value["data"], "AQIDBA==");
    }
}
