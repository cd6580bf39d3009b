#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
#![allow(async_fn_in_trait)]

mod fmt;

mod client;
mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod frame;
mod opcode;
pub mod resources;
pub mod runner;
mod state;
pub mod transport;

pub use client::new;
pub use client::Client;
pub use config::{Config, Mode};
pub use error::Error;
pub use event::{Callbacks, Event};
pub use opcode::Opcode;
pub use resources::Resources;
pub use runner::Runner;
pub use transport::Transport;
