pub mod interlocking;
