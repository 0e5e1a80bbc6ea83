pub mod action_labels;
