// SPDX-License-Identifier: Apache-2.0
//
// MRZ field decoding and check-digit verification.
//
// Supports the TD3 layout (passport booklet, two lines of 44) and the TD1
// layout (credit-card sized documents, three lines of 30). Decoding is
// lenient: a failed check digit flags the field in the result rather than
// discarding it, so the caller can still show the value with a warning.

use tracing::{debug, instrument, warn};
use veriport_core::error::{Result, VeriportError};
use veriport_core::types::{DocumentFields, MrzDecode, MrzField, Sex};

const TD3_LINE_LEN: usize = 44;
const TD1_LINE_LEN: usize = 30;

/// Numeric value of an MRZ character for check-digit computation.
///
/// Digits map to themselves, `A`-`Z` to 10-35, the `<` filler to 0. Any
/// other character has no MRZ value.
fn char_value(c: char) -> Option<u32> {
    match c {
        '0'..='9' => Some(c as u32 - '0' as u32),
        'A'..='Z' => Some(c as u32 - 'A' as u32 + 10),
        '<' => Some(0),
        _ => None,
    }
}

/// Compute the check digit for an MRZ field.
///
/// Characters are weighted 7, 3, 1 cyclically and the weighted sum is taken
/// modulo 10. Returns `None` when the field contains a character outside the
/// MRZ alphabet.
pub fn check_digit(field: &str) -> Option<u8> {
    const WEIGHTS: [u32; 3] = [7, 3, 1];
    let mut sum = 0u32;
    for (i, c) in field.chars().enumerate() {
        sum += char_value(c)? * WEIGHTS[i % 3];
    }
    Some((sum % 10) as u8)
}

/// Verify a field against its declared check digit character.
fn verify(field: &str, declared: char) -> bool {
    match (check_digit(field), declared.to_digit(10)) {
        (Some(computed), Some(decl)) => computed as u32 == decl,
        _ => false,
    }
}

/// Resolve a two-digit MRZ birth year into a full year.
///
/// Years at or above the pivot belong to the 1900s, years below it to the
/// 2000s. The default pivot is 50.
pub fn resolve_dob_year(yy: u32, pivot: u32) -> i32 {
    if yy >= pivot {
        1900 + yy as i32
    } else {
        2000 + yy as i32
    }
}

/// Resolve a two-digit MRZ expiry year into the unique full year inside the
/// window `(now_year - 100, now_year + horizon_years]`.
pub fn resolve_expiry_year(yy: u32, now_year: i32, horizon_years: i32) -> i32 {
    let yy = yy as i32;
    for century in [1900, 2000, 2100] {
        let candidate = century + yy;
        if candidate > now_year - 100 && candidate <= now_year + horizon_years {
            return candidate;
        }
    }
    // Degenerate horizon; fall back to the nearest past century.
    2000 + yy
}

/// Collapse MRZ filler characters into a human-readable name.
///
/// The `<<` separator between surname and given names becomes a single
/// space, as does each remaining filler; runs collapse and edges trim.
fn humanize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_space = true;
    for c in raw.chars() {
        if c == '<' {
            if !last_space {
                out.push(' ');
                last_space = true;
            }
        } else {
            out.push(c);
            last_space = false;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

fn strip_fillers(raw: &str) -> String {
    raw.trim_end_matches('<').replace('<', "")
}

/// Slice a fixed-width field out of an MRZ line.
///
/// Lines are validated to be ASCII before slicing, so byte offsets are
/// character offsets.
fn f(line: &str, range: std::ops::Range<usize>) -> &str {
    &line[range]
}

fn require_line(lines: &[String], idx: usize, len: usize) -> Result<&str> {
    let line = lines.get(idx).ok_or_else(|| {
        VeriportError::DecodeIncomplete(format!(
            "expected at least {} MRZ lines, got {}",
            idx + 1,
            lines.len()
        ))
    })?;
    if line.len() != len || !line.is_ascii() {
        return Err(VeriportError::DecodeIncomplete(format!(
            "MRZ line {} has length {}, expected {}",
            idx + 1,
            line.len(),
            len
        )));
    }
    Ok(line)
}

/// Decode a TD3 (passport) MRZ from filtered candidate lines.
///
/// Expects exactly the two 44-character lines; extra leading lines (from
/// over-eager filtering) are skipped by taking the last two. Check-digit
/// failures are recorded in [`MrzDecode::unverified`], never dropped.
#[instrument(skip_all, fields(candidates = lines.len()))]
pub fn decode_td3(lines: &[String]) -> Result<MrzDecode> {
    if lines.len() < 2 {
        return Err(VeriportError::DecodeIncomplete(format!(
            "need 2 MRZ lines for TD3, got {}",
            lines.len()
        )));
    }
    let lines = &lines[lines.len() - 2..];
    let l1 = require_line(lines, 0, TD3_LINE_LEN)?;
    let l2 = require_line(lines, 1, TD3_LINE_LEN)?;

    let mut unverified = Vec::new();
    let mut errors = Vec::new();

    // Line 1: document type, issuing state, name.
    let document_type = strip_fillers(f(l1, 0..2));
    let issuing_country = strip_fillers(f(l1, 2..5));
    let name = humanize_name(f(l1, 5..44));

    if document_type.is_empty() {
        errors.push("document type field is empty".to_string());
    }

    // Line 2: number, nationality, dates, sex, personal number.
    let document_number_raw = f(l2, 0..9);
    let document_number = strip_fillers(document_number_raw);
    if !verify(document_number_raw, char_at(l2, 9)) {
        warn!(field = %MrzField::DocumentNumber, "check digit mismatch");
        unverified.push(MrzField::DocumentNumber);
        errors.push("document number check digit mismatch".to_string());
    }

    let nationality = strip_fillers(f(l2, 10..13));

    let date_of_birth = f(l2, 13..19).to_string();
    if !date_of_birth.chars().all(|c| c.is_ascii_digit())
        || !verify(&date_of_birth, char_at(l2, 19))
    {
        unverified.push(MrzField::DateOfBirth);
        errors.push("date of birth check digit mismatch".to_string());
    }

    let sex = Sex::from_mrz_char(char_at(l2, 20));

    let date_of_expiry = f(l2, 21..27).to_string();
    if !date_of_expiry.chars().all(|c| c.is_ascii_digit())
        || !verify(&date_of_expiry, char_at(l2, 27))
    {
        unverified.push(MrzField::DateOfExpiry);
        errors.push("date of expiry check digit mismatch".to_string());
    }

    let personal_raw = f(l2, 28..42);
    let personal_number = {
        let stripped = strip_fillers(personal_raw);
        if stripped.is_empty() {
            None
        } else {
            Some(stripped)
        }
    };
    // The personal-number check digit may itself be `<` when the field is
    // empty; that counts as 0 and verifies an all-filler field.
    let personal_check = char_at(l2, 42);
    let personal_ok = if personal_check == '<' {
        check_digit(personal_raw) == Some(0)
    } else {
        verify(personal_raw, personal_check)
    };
    if !personal_ok {
        unverified.push(MrzField::PersonalNumber);
        errors.push("personal number check digit mismatch".to_string());
    }

    // Composite check spans document number, dates and personal number,
    // each with its own check digit included.
    let composite_input =
        format!("{}{}{}", f(l2, 0..10), f(l2, 13..20), f(l2, 21..43));
    if !verify(&composite_input, char_at(l2, 43)) {
        unverified.push(MrzField::Composite);
        errors.push("composite check digit mismatch".to_string());
    }

    debug!(
        unverified = unverified.len(),
        document_type = %document_type,
        "decoded TD3 MRZ"
    );

    Ok(MrzDecode {
        fields: DocumentFields {
            document_type,
            issuing_country,
            name,
            document_number,
            nationality,
            date_of_birth,
            sex,
            date_of_expiry,
            personal_number,
        },
        unverified,
        errors,
    })
}

/// Decode a TD1 (card-format) MRZ from filtered candidate lines.
///
/// Three lines of 30: document data, dates, name. The optional-data fields
/// and the composite digit are decoded but the composite spans line
/// boundaries, so it is only checked when all three lines survived OCR.
#[instrument(skip_all, fields(candidates = lines.len()))]
pub fn decode_td1(lines: &[String]) -> Result<MrzDecode> {
    if lines.len() < 3 {
        return Err(VeriportError::DecodeIncomplete(format!(
            "need 3 MRZ lines for TD1, got {}",
            lines.len()
        )));
    }
    let lines = &lines[lines.len() - 3..];
    let l1 = require_line(lines, 0, TD1_LINE_LEN)?;
    let l2 = require_line(lines, 1, TD1_LINE_LEN)?;
    let l3 = require_line(lines, 2, TD1_LINE_LEN)?;

    let mut unverified = Vec::new();
    let mut errors = Vec::new();

    let document_type = strip_fillers(f(l1, 0..2));
    let issuing_country = strip_fillers(f(l1, 2..5));

    let document_number_raw = f(l1, 5..14);
    let document_number = strip_fillers(document_number_raw);
    if !verify(document_number_raw, char_at(l1, 14)) {
        unverified.push(MrzField::DocumentNumber);
        errors.push("document number check digit mismatch".to_string());
    }

    let date_of_birth = f(l2, 0..6).to_string();
    if !verify(&date_of_birth, char_at(l2, 6)) {
        unverified.push(MrzField::DateOfBirth);
        errors.push("date of birth check digit mismatch".to_string());
    }

    let sex = Sex::from_mrz_char(char_at(l2, 7));

    let date_of_expiry = f(l2, 8..14).to_string();
    if !verify(&date_of_expiry, char_at(l2, 14)) {
        unverified.push(MrzField::DateOfExpiry);
        errors.push("date of expiry check digit mismatch".to_string());
    }

    let nationality = strip_fillers(f(l2, 15..18));

    let personal_number = {
        let stripped = strip_fillers(f(l1, 15..30));
        if stripped.is_empty() {
            None
        } else {
            Some(stripped)
        }
    };

    // Composite: upper/middle line data fields plus their check digits.
    let composite_input = format!(
        "{}{}{}{}",
        f(l1, 5..30),
        f(l2, 0..7),
        f(l2, 8..15),
        f(l2, 18..29)
    );
    if !verify(&composite_input, char_at(l2, 29)) {
        unverified.push(MrzField::Composite);
        errors.push("composite check digit mismatch".to_string());
    }

    let name = humanize_name(l3);

    debug!(unverified = unverified.len(), "decoded TD1 MRZ");

    Ok(MrzDecode {
        fields: DocumentFields {
            document_type,
            issuing_country,
            name,
            document_number,
            nationality,
            date_of_birth,
            sex,
            date_of_expiry,
            personal_number,
        },
        unverified,
        errors,
    })
}

/// Character at a byte offset of an ASCII-validated line.
fn char_at(line: &str, idx: usize) -> char {
    line.as_bytes()[idx] as char
}

#[cfg(test)]
mod tests {
    use super::*;

    fn td3_lines(l1: &str, l2: &str) -> Vec<String> {
        vec![l1.to_string(), l2.to_string()]
    }

    // ICAO 9303 specimen data page. Every check digit on this line,
    // including the composite, verifies.
    const SPECIMEN_L1: &str = "P<UTOERIKSSON<<ANNA<MARIA<<<<<<<<<<<<<<<<<<<";
    const SPECIMEN_L2: &str = "L898902C36UTO7408122F1204159ZE184226B<<<<<10";

    #[test]
    fn check_digit_known_values() {
        assert_eq!(check_digit("L898902C<"), Some(3));
        assert_eq!(check_digit("690806"), Some(1));
        assert_eq!(check_digit("940623"), Some(6));
        assert_eq!(check_digit("ZE184226B<<<<<"), Some(1));
        assert_eq!(check_digit("<<<<<<"), Some(0));
        assert_eq!(check_digit("ab"), None);
    }

    #[test]
    fn decodes_specimen_fully_verified() {
        let decode = decode_td3(&td3_lines(SPECIMEN_L1, SPECIMEN_L2)).unwrap();
        assert!(decode.fully_verified(), "unverified: {:?}", decode.unverified);
        assert!(decode.errors.is_empty());

        let fields = &decode.fields;
        assert_eq!(fields.document_type, "P");
        assert_eq!(fields.issuing_country, "UTO");
        assert_eq!(fields.name, "ERIKSSON ANNA MARIA");
        assert_eq!(fields.document_number, "L898902C3");
        assert_eq!(fields.nationality, "UTO");
        assert_eq!(fields.date_of_birth, "740812");
        assert_eq!(fields.sex, Sex::Female);
        assert_eq!(fields.date_of_expiry, "120415");
        assert_eq!(fields.personal_number.as_deref(), Some("ZE184226B"));
    }

    #[test]
    fn filler_padded_document_number_verifies() {
        // Variant with the document number filler-padded to eight
        // significant characters. Field digits verify; the composite digit
        // belongs to the specimen layout and is flagged, not fatal.
        let l2 = "L898902C<3UTO6908061F9406236ZE184226B<<<<<10";
        let decode = decode_td3(&td3_lines(SPECIMEN_L1, l2)).unwrap();

        assert_eq!(decode.fields.document_number, "L898902C");
        assert_eq!(decode.fields.date_of_birth, "690806");
        assert_eq!(decode.fields.date_of_expiry, "940623");
        assert_eq!(decode.unverified, vec![MrzField::Composite]);
        assert_eq!(decode.errors.len(), 1);
    }

    #[test]
    fn corrupted_check_digit_flags_field_but_keeps_value() {
        // Flip the date-of-birth check digit.
        let mut l2: Vec<u8> = SPECIMEN_L2.bytes().collect();
        l2[19] = b'9';
        let l2 = String::from_utf8(l2).unwrap();
        let decode = decode_td3(&td3_lines(SPECIMEN_L1, &l2)).unwrap();

        assert!(decode.unverified.contains(&MrzField::DateOfBirth));
        // Composite spans the mutated digit, so it fails too.
        assert!(decode.unverified.contains(&MrzField::Composite));
        assert_eq!(decode.fields.date_of_birth, "740812");
    }

    #[test]
    fn too_few_lines_is_incomplete() {
        let err = decode_td3(&[SPECIMEN_L1.to_string()]).unwrap_err();
        assert!(matches!(err, VeriportError::DecodeIncomplete(_)));
    }

    #[test]
    fn wrong_line_length_is_incomplete() {
        let err =
            decode_td3(&td3_lines(SPECIMEN_L1, "L898902C36UTO")).unwrap_err();
        assert!(matches!(err, VeriportError::DecodeIncomplete(_)));
    }

    #[test]
    fn extra_leading_lines_are_skipped() {
        let lines = vec![
            "REPUBLIC<OF<UTOPIA<<<<<<<<<<<<<<<<<<<<<<<<<<".to_string(),
            SPECIMEN_L1.to_string(),
            SPECIMEN_L2.to_string(),
        ];
        let decode = decode_td3(&lines).unwrap();
        assert_eq!(decode.fields.name, "ERIKSSON ANNA MARIA");
    }

    #[test]
    fn dob_century_pivots_at_50() {
        assert_eq!(resolve_dob_year(74, 50), 1974);
        assert_eq!(resolve_dob_year(50, 50), 1950);
        assert_eq!(resolve_dob_year(49, 50), 2049);
        assert_eq!(resolve_dob_year(5, 50), 2005);
    }

    #[test]
    fn expiry_year_resolves_within_window() {
        // With "now" in 2026 and a 50-year horizon, candidates must fall in
        // (1926, 2076].
        assert_eq!(resolve_expiry_year(31, 2026, 50), 2031);
        assert_eq!(resolve_expiry_year(74, 2026, 50), 1974);
        assert_eq!(resolve_expiry_year(12, 2026, 50), 2012);
    }

    #[test]
    fn td1_decodes_three_line_layout() {
        // Constructed TD1 specimen with verifying field digits.
        let doc = "D23145890";
        let doc_check = check_digit(doc).unwrap();
        let dob = "740812";
        let dob_check = check_digit(dob).unwrap();
        let exp = "120415";
        let exp_check = check_digit(exp).unwrap();

        let l1 = format!("I<UTO{doc}{doc_check}<<<<<<<<<<<<<<<");
        let l2_prefix = format!("{dob}{dob_check}F{exp}{exp_check}UTO<<<<<<<<<<<");
        let composite_input = format!(
            "{}{}{}{}",
            &l1[5..30],
            &l2_prefix[0..7],
            &l2_prefix[8..15],
            &l2_prefix[18..29]
        );
        let composite = check_digit(&composite_input).unwrap();
        let l2 = format!("{l2_prefix}{composite}");
        let l3 = "ERIKSSON<<ANNA<MARIA<<<<<<<<<<".to_string();

        assert_eq!(l1.len(), 30);
        assert_eq!(l2.len(), 30);
        assert_eq!(l3.len(), 30);

        let decode = decode_td1(&[l1, l2, l3]).unwrap();
        assert!(decode.fully_verified(), "unverified: {:?}", decode.unverified);
        assert_eq!(decode.fields.document_type, "I");
        assert_eq!(decode.fields.document_number, "D23145890");
        assert_eq!(decode.fields.name, "ERIKSSON ANNA MARIA");
        assert_eq!(decode.fields.date_of_birth, "740812");
        assert_eq!(decode.fields.sex, Sex::Female);
    }

    #[test]
    fn name_humanization_collapses_fillers() {
        assert_eq!(humanize_name("ERIKSSON<<ANNA<MARIA<<<<"), "ERIKSSON ANNA MARIA");
        assert_eq!(humanize_name("<<<<"), "");
        assert_eq!(humanize_name("A<B"), "A B");
    }
}
