//! LAN trivia-game sessions: one device hosts a flag quiz over TCP, other
//! devices join as players.
//!
//! The host side ([`session::host::HostSession`]) owns the listening
//! socket, the player roster, question progression and answer collection;
//! the player side ([`session::client::ClientSession`]) owns one
//! connection and forwards every inbound message to the presentation
//! layer. Both speak newline-delimited JSON frames over a persistent
//! byte stream ([`network::messages`]).

pub mod game;
pub mod logging;
pub mod network;
pub mod session;
