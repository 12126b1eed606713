//! FONT, FORMAT and XF record layouts
//!
//! Font index 4 is never used in the file: the font table skips it, so
//! table position `i` is written as `i` below 4 and `i + 1` from 4 on.
//! Cell styles follow the 15 style XFs, so style `i` is XF `15 + i`.

use super::record_writer::PutLe;
use super::records::{Record, STYLE_XF_COUNT};
use super::strings::{push_short_string, push_string, read_short_string, read_string};
use crate::error::{BiffError, Result};
use crate::tables::{Border, Borders, CellStyle, Fill, Font, FontIndex, FormatIndex, StyleIndex};
use crate::types::{BorderStyle, FillPattern, HorizontalAlignment, Underline, VerticalAlignment};

const FONT_ITALIC: u16 = 0x0002;
const FONT_STRIKEOUT: u16 = 0x0008;

const XF_LOCKED: u16 = 0x0001;
const XF_HIDDEN: u16 = 0x0002;
const XF_STYLE: u16 = 0x0004;
/// Style XF: locked, style flag, parent 0xFFF
const XF_STYLE_TYPE: u16 = 0xFFF5;
const XF_WRAP: u8 = 0x08;
const XF_CELL_USED_ATTRIBUTES: u8 = 0xFC;

pub fn font_record_index(font: FontIndex) -> u16 {
    if font.0 < 4 {
        font.0
    } else {
        font.0 + 1
    }
}

pub fn font_from_record_index(ifnt: u16) -> Option<FontIndex> {
    match ifnt {
        0..=3 => Some(FontIndex(ifnt)),
        4 => None,
        _ => Some(FontIndex(ifnt - 1)),
    }
}

pub fn cell_xf_index(style: StyleIndex) -> Result<u16> {
    STYLE_XF_COUNT
        .checked_add(style.0)
        .ok_or(BiffError::UnknownStyle(style.0))
}

pub fn font_payload(p: &mut Vec<u8>, font: &Font) -> Result<()> {
    let mut grbit = 0u16;
    if font.italic {
        grbit |= FONT_ITALIC;
    }
    if font.strikeout {
        grbit |= FONT_STRIKEOUT;
    }
    p.put_u16(font.height);
    p.put_u16(grbit);
    p.put_u16(font.color);
    p.put_u16(font.weight);
    // escapement
    p.put_u16(0);
    p.put_u8(font.underline.code());
    // family, charset, reserved
    p.put_u8(0);
    p.put_u8(0);
    p.put_u8(0);
    push_short_string(p, &font.name).map_err(|e| BiffError::InvalidFormat(format!("font name: {e}")))
}

pub fn parse_font(record: &Record<'_>) -> Result<Font> {
    record.expect_min_len(16)?;
    let grbit = record.u16_at(2)?;
    let underline_code = record.u8_at(10)?;
    let underline = Underline::from_code(underline_code)
        .ok_or_else(|| record.corrupt(format!("unknown underline 0x{underline_code:02X}")))?;
    let mut pos = 14;
    let name = read_short_string(record.data, &mut pos).ok_or_else(|| record.corrupt("truncated font name"))?;
    Ok(Font {
        name,
        height: record.u16_at(0)?,
        weight: record.u16_at(6)?,
        italic: grbit & FONT_ITALIC != 0,
        strikeout: grbit & FONT_STRIKEOUT != 0,
        underline,
        color: record.u16_at(4)?,
    })
}

pub fn format_payload(p: &mut Vec<u8>, code: FormatIndex, pattern: &str) -> Result<()> {
    p.put_u16(code.0);
    push_string(p, pattern).map_err(|e| BiffError::InvalidFormat(format!("number format: {e}")))
}

pub fn parse_format(record: &Record<'_>) -> Result<(u16, String)> {
    record.expect_min_len(5)?;
    let code = record.u16_at(0)?;
    let mut pos = 2;
    let pattern = read_string(record.data, &mut pos).ok_or_else(|| record.corrupt("truncated format string"))?;
    Ok((code, pattern))
}

fn xf_fields(p: &mut Vec<u8>, style: &CellStyle, type_field: u16, used: u8) {
    p.put_u16(font_record_index(style.font));
    p.put_u16(style.format.0);
    p.put_u16(type_field);

    let mut align = (style.horizontal.code() & 0x07) | ((style.vertical.code() & 0x07) << 4);
    if style.wrap_text {
        align |= XF_WRAP;
    }
    p.put_u8(align);
    p.put_u8(style.rotation);
    p.put_u8(style.indent & 0x0F);
    p.put_u8(used);

    let b = &style.borders;
    let border_styles = (b.left.style.code() as u16 & 0x0F)
        | ((b.right.style.code() as u16 & 0x0F) << 4)
        | ((b.top.style.code() as u16 & 0x0F) << 8)
        | ((b.bottom.style.code() as u16 & 0x0F) << 12);
    p.put_u16(border_styles);
    p.put_u16((b.left.color & 0x7F) | ((b.right.color & 0x7F) << 7));

    let adtl = (b.top.color as u32 & 0x7F)
        | ((b.bottom.color as u32 & 0x7F) << 7)
        | ((style.fill.pattern.code() as u32 & 0x3F) << 26);
    p.put_u32(adtl);
    p.put_u16((style.fill.foreground & 0x7F) | ((style.fill.background & 0x7F) << 7));
}

/// Payload of one of the leading style XFs
pub fn style_xf_payload(p: &mut Vec<u8>) {
    xf_fields(p, &CellStyle::default(), XF_STYLE_TYPE, 0);
}

/// Payload of a cell XF; fields wider than their bit field are rejected
pub fn cell_xf_payload(p: &mut Vec<u8>, style: &CellStyle) -> Result<()> {
    style.validate()?;
    let mut type_field = 0u16;
    if style.locked {
        type_field |= XF_LOCKED;
    }
    if style.hidden {
        type_field |= XF_HIDDEN;
    }
    xf_fields(p, style, type_field, XF_CELL_USED_ATTRIBUTES);
    Ok(())
}

/// A decoded XF record
pub struct ParsedXf {
    pub is_style: bool,
    pub style: CellStyle,
}

fn border(record: &Record<'_>, code: u16, color: u16) -> Result<Border> {
    let style = BorderStyle::from_code(code as u8)
        .ok_or_else(|| record.corrupt(format!("unknown border style {code}")))?;
    Ok(Border { style, color })
}

/// Decode an XF; `font_count` bounds the font reference
pub fn parse_xf(record: &Record<'_>, font_count: usize) -> Result<ParsedXf> {
    record.expect_len(20)?;
    let ifnt = record.u16_at(0)?;
    let font = font_from_record_index(ifnt)
        .filter(|f| f.index() < font_count)
        .ok_or_else(|| record.corrupt(format!("font index {ifnt} out of range ({font_count} fonts)")))?;
    let format = FormatIndex(record.u16_at(2)?);
    let type_field = record.u16_at(4)?;
    let align = record.u8_at(6)?;

    let horizontal = HorizontalAlignment::from_code(align & 0x07)
        .ok_or_else(|| record.corrupt(format!("unknown horizontal alignment {}", align & 0x07)))?;
    let vertical = VerticalAlignment::from_code((align >> 4) & 0x07)
        .ok_or_else(|| record.corrupt(format!("unknown vertical alignment {}", (align >> 4) & 0x07)))?;

    let border_styles = record.u16_at(10)?;
    let palette = record.u16_at(12)?;
    let adtl = record.u32_at(14)?;
    let fill_colors = record.u16_at(18)?;

    let pattern_code = ((adtl >> 26) & 0x3F) as u8;
    let pattern = FillPattern::from_code(pattern_code)
        .ok_or_else(|| record.corrupt(format!("unknown fill pattern {pattern_code}")))?;

    let borders = Borders {
        left: border(record, border_styles & 0x0F, palette & 0x7F)?,
        right: border(record, (border_styles >> 4) & 0x0F, (palette >> 7) & 0x7F)?,
        top: border(record, (border_styles >> 8) & 0x0F, (adtl & 0x7F) as u16)?,
        bottom: border(record, (border_styles >> 12) & 0x0F, ((adtl >> 7) & 0x7F) as u16)?,
    };

    Ok(ParsedXf {
        is_style: type_field & XF_STYLE != 0,
        style: CellStyle {
            font,
            format,
            horizontal,
            vertical,
            wrap_text: align & XF_WRAP != 0,
            indent: record.u8_at(8)? & 0x0F,
            rotation: record.u8_at(7)?,
            borders,
            fill: Fill {
                pattern,
                foreground: fill_colors & 0x7F,
                background: (fill_colors >> 7) & 0x7F,
            },
            locked: type_field & XF_LOCKED != 0,
            hidden: type_field & XF_HIDDEN != 0,
        },
    })
}
