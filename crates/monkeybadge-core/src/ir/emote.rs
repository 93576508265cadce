/// Emote codes carried by `EMOTE` messages, shared by sender and receiver.
pub const EMOTES: &[(u8, &str)] = &[
    (0, "<3"),
    (1, ":)"),
    (2, ":("),
    (3, ";)"),
    (4, ":P"),
    (5, "o_O"),
    (6, "\\o/"),
    (7, "OOK OOK"),
    (8, "banana?"),
    (9, "hi5"),
];

pub fn emote_text(code: u8) -> Option<&'static str> {
    EMOTES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, text)| *text)
}
