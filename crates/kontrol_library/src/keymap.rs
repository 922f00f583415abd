//! Translation between absolute MIDI notes and the local key-LED index
//! window selected by the current first note (octave transpose).

/// Maps an absolute MIDI note onto the local key index, or `None` when the
/// note lies outside the window `[first_note, first_note + num_keys)`.
pub fn to_local_index(first_note: u8, num_keys: usize, note: u8) -> Option<usize> {
    let local = i32::from(note) - i32::from(first_note);
    if local >= 0 && (local as usize) < num_keys {
        Some(local as usize)
    } else {
        None
    }
}

/// Maps a local key index back to its absolute MIDI note, or `None` when
/// the result would leave the MIDI note range.
pub fn to_absolute_note(first_note: u8, local_index: usize) -> Option<u8> {
    let note = usize::from(first_note) + local_index;
    if note < 128 { Some(note as u8) } else { None }
}
