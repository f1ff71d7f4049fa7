/// Telegram's maximum message length in characters.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// Split `text` into chunks of at most `limit` characters, breaking on line
/// boundaries. A single line longer than `limit` is cut at character
/// boundaries.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.lines() {
        let line_len = line.chars().count();

        if line_len > limit {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = line.chars().collect();
            chunks.extend(chars.chunks(limit).map(|piece| piece.iter().collect::<String>()));
            continue;
        }

        let needed = if current.is_empty() {
            line_len
        } else {
            current_len + 1 + line_len
        };
        if needed > limit {
            chunks.push(std::mem::take(&mut current));
            current.push_str(line);
            current_len = line_len;
        } else {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
            current_len = needed;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
