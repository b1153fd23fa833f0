//! Shared fixtures for command and mode tests.

pub(crate) use inkkeys::port::mock::MockPort;

/// Handshake of a 212x104 keypad with 9 LEDs.
pub(crate) const INFO_FIXTURE: &[u8] =
    b"Inkkeys\nTEST 0\nN_LED 9\nDISP_W 212\nDISP_H 104\nROT_CIRCLE_STEPS 24\nDone\n";
