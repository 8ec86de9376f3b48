//! The four external-sensor contract stand-ins: GPS, INS, landing
//! radio, and SATCOM. Each is explicitly out of scope for *behavioral*
//! fidelity, but every one is a named entry point in the external
//! interface, so each is a real, honestly labeled implementation of its
//! wire contract rather than a no-op.

pub mod gps;
pub mod ins;
pub mod landing_radio;
mod net;
pub mod sat_com;

pub use gps::gps_main;
pub use ins::ins_main;
pub use landing_radio::landing_radio_main;
pub use sat_com::sat_com_main;
