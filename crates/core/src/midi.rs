/// MIDI message types we care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn(u8, u8), // (note, velocity)
    NoteOff(u8),    // note
    ControlChange(u8, u8),
}

impl MidiMessage {
    /// Parse a raw MIDI message from the wire.
    ///
    /// Note-on with velocity 0 is the running-status note-off convention and
    /// is reported as `NoteOff`.
    pub fn parse(message: &[u8]) -> Option<MidiMessage> {
        if message.len() < 3 {
            return None;
        }

        match message[0] & 0xF0 {
            0x90 => {
                if message[2] > 0 {
                    Some(MidiMessage::NoteOn(message[1], message[2]))
                } else {
                    Some(MidiMessage::NoteOff(message[1]))
                }
            }
            0x80 => Some(MidiMessage::NoteOff(message[1])),
            0xB0 => Some(MidiMessage::ControlChange(message[1], message[2])),
            _ => None,
        }
    }
}
