pub mod events;
pub mod export;
pub mod fetch;
pub mod network;
pub mod output;
pub mod simtime;
pub mod traffic;
pub mod zones;
