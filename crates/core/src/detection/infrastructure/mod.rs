pub mod execution_provider;
pub mod model_resolver;
pub mod onnx_face_detector;
pub mod replay_face_detector;
