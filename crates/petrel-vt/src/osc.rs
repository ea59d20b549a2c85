//! OSC: operating system commands.
//!
//! Dispatches on the numeric prefix of the collected string: window title,
//! palette get/set, working directory, hyperlinks, dynamic colors,
//! clipboard, resets, shell-integration markers, and notifications.
//! Unrecognized commands are logged and ignored.

use base64::Engine as _;
use memchr::memchr;
use tracing::debug;

use crate::events::{ClipboardTarget, ShellMarker, TermEvent};
use crate::term::Term;

pub(crate) fn dispatch(term: &mut Term) {
    let data = std::mem::take(&mut term.vt.osc);
    let (cmd, rest) = match memchr(b';', &data) {
        Some(at) => (&data[..at], &data[at + 1..]),
        None => (&data[..], &data[..0]),
    };
    let Some(cmd) = parse_number(cmd) else {
        debug!("OSC with non-numeric command");
        return;
    };

    match cmd {
        0 | 1 | 2 => {
            let title = String::from_utf8_lossy(rest).into_owned();
            term.set_title(&title);
        }

        4 => palette_pairs(term, rest),

        7 => {
            if let Some(path) = file_url_path(rest) {
                term.push_event(TermEvent::CwdChanged(path));
            } else {
                debug!("OSC 7 with unparsable URL");
            }
        }

        8 => hyperlink(term, rest),

        10 | 11 | 12 => dynamic_color(term, cmd, rest),

        52 => clipboard(term, rest),

        104 => {
            if rest.is_empty() {
                term.colors.table = term.colors.default_table;
            } else {
                for index in rest.split(|&b| b == b';').filter_map(parse_number) {
                    if let Some(slot) = term.colors.table.get_mut(index as usize) {
                        *slot = term.colors.default_table[index as usize];
                    }
                }
            }
            term.push_event(TermEvent::ColorsChanged);
        }
        110 => {
            term.colors.fg = term.colors.default_fg;
            term.push_event(TermEvent::ColorsChanged);
        }
        111 => {
            term.colors.bg = term.colors.default_bg;
            term.push_event(TermEvent::ColorsChanged);
        }
        112 => {
            term.colors.cursor = term.colors.default_cursor;
            term.colors.cursor_text = term.colors.default_cursor_text;
            term.push_event(TermEvent::ColorsChanged);
        }

        133 => shell_integration(term, rest),

        777 => notify(term, rest),

        _ => debug!(cmd, "unimplemented OSC"),
    }
}

fn parse_number(bytes: &[u8]) -> Option<u32> {
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let mut value: u32 = 0;
    for &b in bytes {
        value = value
            .saturating_mul(10)
            .saturating_add(u32::from(b - b'0'));
    }
    Some(value)
}

/// OSC 4: alternating `index;spec` pairs; `?` queries, otherwise sets.
fn palette_pairs(term: &mut Term, rest: &[u8]) {
    let tokens: Vec<&[u8]> = rest.split(|&b| b == b';').collect();
    let mut changed = false;
    for pair in tokens.chunks_exact(2) {
        let Some(index) = parse_number(pair[0]) else {
            continue;
        };
        if index > 255 {
            continue;
        }
        if pair[1] == b"?" {
            let rgb = term.colors.table[index as usize];
            let reply = format!(
                "\x1b]4;{index};{}{}",
                rgb_spec(rgb),
                terminator(term)
            );
            term.reply(reply.into_bytes());
        } else if let Some(rgb) = parse_color(pair[1]) {
            term.colors.table[index as usize] = rgb;
            changed = true;
        } else {
            debug!(index, "unparsable OSC 4 color spec");
        }
    }
    if changed {
        term.push_event(TermEvent::ColorsChanged);
    }
}

/// OSC 10/11/12: dynamic foreground / background / cursor color.
fn dynamic_color(term: &mut Term, cmd: u32, rest: &[u8]) {
    if rest == b"?" {
        let rgb = match cmd {
            10 => term.colors.fg,
            11 => term.colors.bg,
            _ => term.colors.cursor,
        };
        let reply = format!("\x1b]{cmd};{}{}", rgb_spec(rgb), terminator(term));
        term.reply(reply.into_bytes());
        return;
    }
    match parse_color(rest) {
        Some(rgb) => {
            match cmd {
                10 => term.colors.fg = rgb,
                11 => term.colors.bg = rgb,
                _ => term.colors.cursor = rgb,
            }
            term.push_event(TermEvent::ColorsChanged);
        }
        None => debug!(cmd, "unparsable dynamic color spec"),
    }
}

/// OSC 8: `params;uri`. An empty URI closes the hyperlink.
///
/// The open link holds one registry reference; closing or replacing it
/// releases that reference (printed spans keep their own).
fn hyperlink(term: &mut Term, rest: &[u8]) {
    let Some(split) = memchr(b';', rest) else {
        debug!("OSC 8 without URI field");
        return;
    };
    // Parameters (`id=...`) are accepted but not used for dedup beyond the
    // URI itself.
    let uri = &rest[split + 1..];
    let previous = term.current_link;
    if uri.is_empty() {
        term.current_link = 0;
        term.links.release_id(previous);
        return;
    }
    match std::str::from_utf8(uri) {
        Ok(uri) => {
            term.current_link = term.links.acquire(uri);
            term.links.release_id(previous);
        }
        Err(_) => debug!("OSC 8 URI is not UTF-8"),
    }
}

/// OSC 52: `targets;payload`. Base64 payload sets; `?` queries.
fn clipboard(term: &mut Term, rest: &[u8]) {
    let Some(split) = memchr(b';', rest) else {
        debug!("OSC 52 without payload");
        return;
    };
    let (targets, payload) = (&rest[..split], &rest[split + 1..]);
    let targets: Vec<ClipboardTarget> = if targets.is_empty() {
        vec![ClipboardTarget::Clipboard]
    } else {
        targets
            .iter()
            .filter_map(|&b| match b {
                b'c' | b's' => Some(ClipboardTarget::Clipboard),
                b'p' => Some(ClipboardTarget::Primary),
                _ => None,
            })
            .collect()
    };
    if targets.is_empty() {
        return;
    }

    if payload == b"?" {
        for target in targets {
            term.push_event(TermEvent::ClipboardQuery { target });
        }
        return;
    }
    match base64::engine::general_purpose::STANDARD.decode(payload) {
        Ok(data) => {
            for target in targets {
                term.push_event(TermEvent::ClipboardSet {
                    target,
                    data: data.clone(),
                });
            }
        }
        Err(_) => debug!("OSC 52 payload is not valid base64"),
    }
}

fn shell_integration(term: &mut Term, rest: &[u8]) {
    let mut fields = rest.split(|&b| b == b';');
    match fields.next() {
        Some(b"A") => term.push_event(TermEvent::ShellIntegration(ShellMarker::PromptStart)),
        Some(b"B") => term.push_event(TermEvent::ShellIntegration(ShellMarker::CommandStart)),
        Some(b"D") => {
            let code = fields
                .next()
                .and_then(parse_number)
                .and_then(|v| i32::try_from(v).ok());
            term.push_event(TermEvent::ShellIntegration(ShellMarker::CommandFinished(
                code,
            )));
        }
        other => debug!(?other, "ignored OSC 133 marker"),
    }
}

fn notify(term: &mut Term, rest: &[u8]) {
    let mut fields = rest.splitn(3, |&b| b == b';');
    if fields.next() != Some(b"notify".as_slice()) {
        debug!("unrecognized OSC 777 subcommand");
        return;
    }
    let summary = fields
        .next()
        .map(|b| String::from_utf8_lossy(b).into_owned())
        .unwrap_or_default();
    let body = fields
        .next()
        .map(|b| String::from_utf8_lossy(b).into_owned())
        .unwrap_or_default();
    term.push_event(TermEvent::Notify { summary, body });
}

fn terminator(term: &Term) -> &'static str {
    if term.vt.osc_bel_terminated {
        "\x07"
    } else {
        "\x1b\\"
    }
}

/// Format a color as the 16-bit-per-channel `rgb:` form used in replies.
fn rgb_spec(rgb: u32) -> String {
    let r = ((rgb >> 16) & 0xff) * 0x101;
    let g = ((rgb >> 8) & 0xff) * 0x101;
    let b = (rgb & 0xff) * 0x101;
    format!("rgb:{r:04x}/{g:04x}/{b:04x}")
}

/// XParseColor-style specs: `rgb:R/G/B` with 1-4 hex digits per channel,
/// or `#RGB`, `#RRGGBB`, `#RRRGGGBBB`, `#RRRRGGGGBBBB`.
pub(crate) fn parse_color(spec: &[u8]) -> Option<u32> {
    if let Some(rest) = spec.strip_prefix(b"rgb:") {
        let mut channels = rest.split(|&b| b == b'/');
        let r = scaled_channel(channels.next()?)?;
        let g = scaled_channel(channels.next()?)?;
        let b = scaled_channel(channels.next()?)?;
        if channels.next().is_some() {
            return None;
        }
        return Some((r << 16) | (g << 8) | b);
    }
    if let Some(rest) = spec.strip_prefix(b"#") {
        let len = rest.len();
        if len % 3 != 0 || len == 0 || len > 12 {
            return None;
        }
        let digits = len / 3;
        let r = hex_channel(&rest[..digits])?;
        let g = hex_channel(&rest[digits..2 * digits])?;
        let b = hex_channel(&rest[2 * digits..])?;
        // `#` form: digits are the most significant bits.
        let scale = |v: u32| match digits {
            1 => v << 4,
            2 => v,
            3 => v >> 4,
            _ => v >> 8,
        };
        return Some((scale(r) << 16) | (scale(g) << 8) | scale(b));
    }
    None
}

/// `rgb:` form: scale an n-digit channel to 8 bits.
fn scaled_channel(digits: &[u8]) -> Option<u32> {
    let v = hex_channel(digits)?;
    let max = match digits.len() {
        1 => 0xf,
        2 => 0xff,
        3 => 0xfff,
        4 => 0xffff,
        _ => return None,
    };
    Some(v * 0xff / max)
}

fn hex_channel(digits: &[u8]) -> Option<u32> {
    if digits.is_empty() || digits.len() > 4 {
        return None;
    }
    let s = std::str::from_utf8(digits).ok()?;
    u32::from_str_radix(s, 16).ok()
}

/// Percent-decode the path component of a `file://` URL.
fn file_url_path(url: &[u8]) -> Option<String> {
    let url = std::str::from_utf8(url).ok()?;
    let rest = url.strip_prefix("file://")?;
    // Skip the host part.
    let path = match rest.find('/') {
        Some(at) => &rest[at..],
        None => return None,
    };
    let mut out = Vec::with_capacity(path.len());
    let bytes = path.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hi = (bytes[i + 1] as char).to_digit(16)?;
            let lo = (bytes[i + 2] as char).to_digit(16)?;
            out.push((hi * 16 + lo) as u8);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
