pub(super) const MAX_BURST_SIZE: usize = 100;
pub(super) const MAX_LOG_FILES: usize = 10;

pub(super) fn default_true() -> bool {
    true
}

pub(super) fn default_burst_size() -> usize {
    5
}

pub(super) fn default_inter_frame_delay_ms() -> u64 {
    150
}

pub(super) fn default_slot_size() -> u32 {
    200
}

pub(super) fn default_batch_size() -> usize {
    5
}

pub(super) fn default_epochs() -> usize {
    10
}

pub(super) fn default_hidden_size() -> usize {
    128
}

pub(super) fn default_learning_rate() -> f32 {
    0.05
}

pub(super) fn default_per_light_offset_ms() -> u64 {
    1_000
}

pub(super) fn default_hold_duration_secs() -> f32 {
    1.0
}

pub(super) fn default_sample_interval_ms() -> u64 {
    10
}

pub(super) fn default_refresh_interval_ms() -> u64 {
    16
}

pub(super) fn default_feature_input_size() -> u32 {
    16
}

pub(super) fn default_camera_width() -> u32 {
    320
}

pub(super) fn default_camera_height() -> u32 {
    240
}

pub(super) fn default_camera_fps() -> u32 {
    30
}

pub(super) fn default_log_level() -> String {
    "info".to_string()
}

pub(super) fn default_max_log_files() -> usize {
    MAX_LOG_FILES
}
