use fedswipe_core::{
    codec::{Float32Codec, ModelCodec},
    message::UpdateMessage,
    model::ParameterVector,
    ModelVersion,
};

pub use crate::state_machine::tests::utils::params;

/// Serializes an update message as a client would send it.
pub fn update_message(
    parameters: &ParameterVector,
    model_version: ModelVersion,
    samples_used: u32,
) -> String {
    let message = UpdateMessage::new(Float32Codec.encode(parameters), model_version, samples_used);
    serde_json::to_string(&message).unwrap()
}
