/// Finds the first index `>= start` where `pattern` occurs in `lines` as a
/// contiguous, exact, line-for-line match.
///
/// An empty pattern matches at `start`. Comparison is byte-exact: no
/// whitespace or unicode normalization is attempted, so a patch whose
/// context drifted from the file is rejected rather than guessed at.
pub(crate) fn seek_sequence(lines: &[String], pattern: &[String], start: usize) -> Option<usize> {
    if pattern.is_empty() {
        return Some(start);
    }
    if pattern.len() > lines.len() {
        return None;
    }
    (start..=lines.len() - pattern.len()).find(|&i| lines[i..i + pattern.len()] == *pattern)
}
