//! Protein-change normalisation.
//!
//! Maps the notations found in variant tables ("G1202R", "p.G1202R",
//! "p.Gly1202Arg", "g1202del") onto one short form so the site table can be
//! matched by string equality.
//!
//! # Example
//! ```ignore
//! let norm = ProteinChangeNormaliser::new()?;
//! assert_eq!(norm.normalise("p.Gly1202Arg").as_deref(), Some("G1202R"));
//! ```

use regex::Regex;

/// Three-letter amino acid code (any case) → one-letter code.
fn aa3_to_aa1(aa: &str) -> Option<char> {
    let c = match aa.to_ascii_uppercase().as_str() {
        "ALA" => 'A', "CYS" => 'C', "ASP" => 'D',
        "GLU" => 'E', "PHE" => 'F', "GLY" => 'G',
        "HIS" => 'H', "ILE" => 'I', "LYS" => 'K',
        "LEU" => 'L', "MET" => 'M', "ASN" => 'N',
        "PRO" => 'P', "GLN" => 'Q', "ARG" => 'R',
        "SER" => 'S', "THR" => 'T', "VAL" => 'V',
        "TRP" => 'W', "TYR" => 'Y', "TER" => '*',
        _ => return None,
    };
    Some(c)
}

fn one_letter(aa: &str) -> Option<char> {
    match aa.len() {
        1 => aa.chars().next().filter(|c| c.is_ascii_uppercase() || *c == '*'),
        3 => aa3_to_aa1(aa),
        _ => None,
    }
}

pub struct ProteinChangeNormaliser {
    /// Optional `p.` prefix, reference residue, position, alternate residue or `del`.
    re: Regex,
}

impl ProteinChangeNormaliser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            re: Regex::new(r"^(?:P\.)?([A-Z]{3}|[A-Z])(\d+)([A-Z]{3}|[A-Z*]|DEL)$")?,
        })
    }

    /// Short form of a missense, nonsense or single-residue deletion:
    /// `G1202R`, `R1275*`, `G1202del`. Returns `None` for anything else.
    pub fn normalise(&self, raw: &str) -> Option<String> {
        let upper = raw.trim().to_ascii_uppercase();
        let caps = self.re.captures(&upper)?;

        let ref_aa = one_letter(caps.get(1)?.as_str())?;
        if ref_aa == '*' {
            return None;
        }
        let pos: u32 = caps.get(2)?.as_str().parse().ok()?;
        if pos == 0 {
            return None;
        }
        let alt = caps.get(3)?.as_str();
        if alt == "DEL" {
            return Some(format!("{ref_aa}{pos}del"));
        }
        let alt_aa = one_letter(alt)?;
        Some(format!("{ref_aa}{pos}{alt_aa}"))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
