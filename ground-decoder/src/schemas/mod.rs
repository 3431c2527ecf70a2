//! Built-in packet schema definitions.
pub mod adcs_css_vector;
pub mod adcs_current_state;
pub mod adcs_meas_rw_speed;
pub mod eps_ses_temp;
