//! SBML identifier decoding and reaction listing.
//!
//! SBML ids are coded: `R_` / `M_` prefixes, `__<n>__` for the character with
//! code `n`, and a trailing `_<compartment>` on metabolites.

use crate::error::{MenevalError, Result};
use regex::Regex;
use serde::Deserialize;
use std::{
    collections::BTreeSet,
    fs,
    path::Path,
    sync::LazyLock,
};

static CODED_CHAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"__(\d+)__").expect("valid coded char pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SbmlIdKind {
    Reaction,
    Metabolite,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedId {
    pub id: String,
    pub kind: SbmlIdKind,
    pub compartment: Option<String>,
}

fn decode_chars(coded: &str) -> String {
    CODED_CHAR
        .replace_all(coded, |caps: &regex::Captures| {
            caps[1]
                .parse::<u32>()
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

pub fn decode_coded_id(raw: &str) -> DecodedId {
    if let Some(rest) = raw.strip_prefix("R_") {
        return DecodedId {
            id: decode_chars(rest),
            kind: SbmlIdKind::Reaction,
            compartment: None,
        };
    }
    if let Some(rest) = raw.strip_prefix("M_") {
        let (coded, compartment) = match rest.rsplit_once('_') {
            Some((coded, compartment)) if !coded.is_empty() && !compartment.is_empty() => {
                (coded, Some(compartment.to_string()))
            }
            _ => (rest, None),
        };
        return DecodedId {
            id: decode_chars(coded),
            kind: SbmlIdKind::Metabolite,
            compartment,
        };
    }
    DecodedId {
        id: decode_chars(raw),
        kind: SbmlIdKind::Other,
        compartment: None,
    }
}

/// Plain identifier of a coded SBML id.
pub fn plain_id(raw: &str) -> String {
    decode_coded_id(raw).id
}

#[derive(Debug, Deserialize)]
struct SbmlDocument {
    model: SbmlModel,
}

#[derive(Debug, Deserialize)]
struct SbmlModel {
    #[serde(rename = "listOfReactions", default)]
    reactions: Option<SbmlReactionList>,
}

#[derive(Debug, Deserialize)]
struct SbmlReactionList {
    #[serde(rename = "reaction", default)]
    reactions: Vec<SbmlReaction>,
}

#[derive(Debug, Deserialize)]
struct SbmlReaction {
    #[serde(rename = "@id")]
    id: String,
}

pub fn parse_reaction_ids(xml: &str) -> Result<BTreeSet<String>> {
    let document: SbmlDocument = quick_xml::de::from_str(xml)
        .map_err(|e| MenevalError::Format(format!("Malformed SBML: {e}")))?;
    Ok(document
        .model
        .reactions
        .map(|list| list.reactions)
        .unwrap_or_default()
        .iter()
        .map(|reaction| plain_id(&reaction.id))
        .collect())
}

/// Decoded ids of every reaction of an SBML network.
pub fn reaction_ids_from_file(path: &Path) -> Result<BTreeSet<String>> {
    let text = fs::read_to_string(path)?;
    parse_reaction_ids(&text)
        .map_err(|e| MenevalError::Format(format!("Could not parse '{}': {e}", path.display())))
}
