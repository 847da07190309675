pub mod annotate_frame_use_case;
pub mod capture_passport_use_case;
pub mod pipeline_logger;
