//! English monophthong targets for the F1/F2 vowel space.
//!
//! American values follow Peterson & Barney (1952); British RP values follow
//! the UCL phonetics measurements. F1 falls as the tongue rises, F2 rises as it
//! moves forward, F3 stays roughly fixed.

use std::collections::HashSet;

// Hz distance on both F1 and F2 under which two vowels share a position.
const OVERLAP_THRESHOLD: f32 = 50.0;
const F1_SCALE: f32 = 300.0;
const F2_SCALE: f32 = 900.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dialect {
    American,
    British,
    Both,
}

impl Dialect {
    fn opposite(self) -> Dialect {
        match self {
            Dialect::American => Dialect::British,
            Dialect::British => Dialect::American,
            Dialect::Both => Dialect::Both,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VowelPreset {
    pub ipa: &'static str,
    pub label: &'static str,
    pub f1: f32,
    pub f2: f32,
    pub f3: f32,
    pub f1_bandwidth: f32,
    pub f2_bandwidth: f32,
    pub f1_gain: f32,
    pub f2_gain: f32,
    pub dialect: Dialect,
}

macro_rules! vowel {
    ($ipa:expr, $label:expr, $f1:expr, $f2:expr, $f3:expr, $bw1:expr, $bw2:expr, $g1:expr, $g2:expr, $dialect:ident) => {
        VowelPreset {
            ipa: $ipa,
            label: $label,
            f1: $f1,
            f2: $f2,
            f3: $f3,
            f1_bandwidth: $bw1,
            f2_bandwidth: $bw2,
            f1_gain: $g1,
            f2_gain: $g2,
            dialect: Dialect::$dialect,
        }
    };
}

#[rustfmt::skip]
pub const AMERICAN: [VowelPreset; 11] = [
    vowel!("i", "beet",    270.0, 2290.0, 3010.0,  60.0,  90.0, 15.0, 18.0, American),
    vowel!("ɪ", "bit",     390.0, 1990.0, 2550.0,  70.0, 100.0, 16.0, 16.0, American),
    vowel!("e", "bait",    530.0, 1840.0, 2480.0,  80.0, 100.0, 18.0, 15.0, American),
    vowel!("ɛ", "bet",     610.0, 1720.0, 2440.0,  90.0, 110.0, 18.0, 14.0, American),
    vowel!("æ", "bat",     660.0, 1720.0, 2410.0, 100.0, 110.0, 20.0, 12.0, American),
    vowel!("ɑ", "father",  730.0, 1090.0, 2440.0, 110.0, 100.0, 22.0, 10.0, American),
    vowel!("ɔ", "thought", 570.0,  840.0, 2410.0,  90.0,  80.0, 18.0, 12.0, American),
    vowel!("ʊ", "foot",    440.0, 1020.0, 2240.0,  70.0,  80.0, 16.0, 14.0, American),
    vowel!("u", "goose",   300.0,  870.0, 2240.0,  60.0,  70.0, 14.0, 16.0, American),
    vowel!("ʌ", "strut",   640.0, 1190.0, 2390.0,  90.0, 100.0, 18.0, 14.0, American),
    vowel!("ə", "comma",   500.0, 1500.0, 2490.0,  80.0, 100.0, 18.0, 15.0, American),
];

#[rustfmt::skip]
pub const BRITISH: [VowelPreset; 12] = [
    vowel!("iː", "fleece",  285.0, 2373.0, 3000.0,  60.0,  90.0, 15.0, 18.0, British),
    vowel!("ɪ",  "kit",     356.0, 2098.0, 2600.0,  70.0, 100.0, 16.0, 16.0, British),
    vowel!("e",  "dress",   569.0, 1965.0, 2500.0,  80.0, 100.0, 18.0, 15.0, British),
    vowel!("æ",  "trap",    748.0, 1746.0, 2450.0, 100.0, 110.0, 20.0, 12.0, British),
    vowel!("ɑː", "bath",    677.0, 1083.0, 2450.0, 110.0, 100.0, 22.0, 10.0, British),
    vowel!("ɒ",  "lot",     599.0,  891.0, 2400.0,  90.0,  80.0, 18.0, 12.0, British),
    vowel!("ɔː", "thought", 449.0,  737.0, 2400.0,  80.0,  80.0, 17.0, 13.0, British),
    vowel!("ʊ",  "foot",    376.0,  950.0, 2250.0,  70.0,  80.0, 16.0, 14.0, British),
    vowel!("uː", "goose",   300.0,  900.0, 2250.0,  60.0,  70.0, 14.0, 16.0, British),
    vowel!("ʌ",  "strut",   640.0, 1200.0, 2400.0,  90.0, 100.0, 18.0, 14.0, British),
    vowel!("ɜː", "nurse",   580.0, 1380.0, 2500.0,  85.0, 100.0, 18.0, 15.0, British),
    vowel!("ə",  "schwa",   500.0, 1500.0, 2500.0,  80.0, 100.0, 18.0, 15.0, British),
];

/// Every preset, American first.
pub fn all() -> impl Iterator<Item = &'static VowelPreset> {
    AMERICAN.iter().chain(BRITISH.iter())
}

pub fn are_overlapping(a: &VowelPreset, b: &VowelPreset) -> bool {
    (a.f1 - b.f1).abs() < OVERLAP_THRESHOLD && (a.f2 - b.f2).abs() < OVERLAP_THRESHOLD
}

/// A preset as drawn on the vowel chart.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayVowel {
    pub preset: VowelPreset,
    pub effective_dialect: Dialect,
    pub overlapping_with: Option<VowelPreset>,
}

/// Presets with cross-dialect duplicates merged into one `Both` entry at the
/// American position.
pub fn display_vowels() -> Vec<DisplayVowel> {
    let presets: Vec<&VowelPreset> = all().collect();
    let mut processed = HashSet::new();
    let mut result = Vec::with_capacity(presets.len());

    for (i, vowel) in presets.iter().enumerate() {
        if processed.contains(&i) {
            continue;
        }
        let opposite = vowel.dialect.opposite();
        let partner = presets.iter().enumerate().find(|(j, other)| {
            other.dialect == opposite && !processed.contains(j) && are_overlapping(vowel, other)
        });
        processed.insert(i);

        match partner {
            Some((j, other)) => {
                processed.insert(j);
                let (base, merged) = if vowel.dialect == Dialect::American {
                    (**vowel, **other)
                } else {
                    (**other, **vowel)
                };
                result.push(DisplayVowel {
                    preset: base,
                    effective_dialect: Dialect::Both,
                    overlapping_with: Some(merged),
                });
            }
            None => result.push(DisplayVowel {
                preset: **vowel,
                effective_dialect: vowel.dialect,
                overlapping_with: None,
            }),
        }
    }
    result
}

/// Closest preset in the normalized F1/F2 plane. Ties keep the earlier entry.
pub fn find_nearest(f1: f32, f2: f32) -> &'static VowelPreset {
    let mut nearest = &AMERICAN[0];
    let mut best = f32::INFINITY;
    for vowel in all() {
        let d1 = (f1 - vowel.f1) / F1_SCALE;
        let d2 = (f2 - vowel.f2) / F2_SCALE;
        let dist = d1 * d1 + d2 * d2;
        if dist < best {
            best = dist;
            nearest = vowel;
        }
    }
    nearest
}

pub fn find_by_ipa(ipa: &str) -> Option<&'static VowelPreset> {
    all().find(|v| v.ipa == ipa)
}

/// Schwa, the neutral starting vowel.
pub fn default_vowel() -> &'static VowelPreset {
    find_by_ipa("ə").unwrap_or(&AMERICAN[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_pairs_merge() {
        let shown = display_vowels();
        assert_eq!(shown.len(), AMERICAN.len() + BRITISH.len() - 3);

        let merged: Vec<&str> = shown
            .iter()
            .filter(|v| v.effective_dialect == Dialect::Both)
            .map(|v| v.preset.label)
            .collect();
        assert_eq!(merged, vec!["goose", "strut", "comma"]);

        for entry in shown.iter().filter(|v| v.effective_dialect == Dialect::Both) {
            assert_eq!(entry.preset.dialect, Dialect::American);
            assert_eq!(
                entry.overlapping_with.map(|v| v.dialect),
                Some(Dialect::British)
            );
        }
    }

    #[test]
    fn overlap_is_strict() {
        // lot vs thought differ by exactly 51 Hz on F2
        assert!(!are_overlapping(&AMERICAN[6], &BRITISH[5]));
        assert!(are_overlapping(&AMERICAN[9], &BRITISH[9]));
    }

    #[test]
    fn nearest_uses_scaled_distance() {
        assert_eq!(find_nearest(275.0, 2300.0).label, "beet");
        assert_eq!(find_nearest(740.0, 1750.0).label, "trap");
        assert_eq!(find_nearest(500.0, 1500.0).label, "comma");
    }

    #[test]
    fn default_is_schwa() {
        let v = default_vowel();
        assert_eq!(v.ipa, "ə");
        assert_eq!(v.dialect, Dialect::American);
    }

    #[test]
    fn presets_are_ordered_formants() {
        for v in all() {
            assert!(v.f1 < v.f2 && v.f2 < v.f3, "{}", v.label);
            assert!(v.f1_bandwidth > 0.0 && v.f2_bandwidth > 0.0);
        }
    }
}
