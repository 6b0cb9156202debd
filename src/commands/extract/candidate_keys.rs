/// Builds the key for the candidate at 1-based `position` in a results header.
///
/// Identity is positional: display names repeat across documents and are
/// rendered inconsistently, so they never take part in the key.
pub(crate) fn candidate_key(ls_code: &str, ac_code: &str, position: usize) -> String {
    format!("LS_{ls_code}_AC{ac_code}_C{position}")
}

pub(crate) fn candidate_keys_for(
    ls_code: &str,
    ac_code: &str,
    candidate_count: usize,
) -> Vec<String> {
    (1..=candidate_count)
        .map(|position| candidate_key(ls_code, ac_code, position))
        .collect()
}
