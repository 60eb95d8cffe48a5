//! Messaging channels the broker talks through.

pub mod whatsapp;
