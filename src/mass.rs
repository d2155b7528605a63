pub const PROTON: f64 = 1.00727646677;
pub const WATER: f64 = 18.0105646837;

// observed minus theoretical, in m/z
pub const DEFAULT_DELTA_MZ_TOLERANCE: f64 = 4.0;

pub fn residue_mass(residue: char) -> Option<f64> {
    let mass = match residue.to_ascii_uppercase() {
        'G' => 57.021464,
        'A' => 71.037114,
        'S' => 87.032028,
        'P' => 97.052764,
        'V' => 99.068414,
        'T' => 101.047679,
        'C' => 103.009185,
        'L' | 'I' => 113.084064,
        'N' => 114.042927,
        'D' => 115.026943,
        'Q' => 128.058578,
        'K' => 128.094963,
        'E' => 129.042593,
        'M' => 131.040485,
        'H' => 137.058912,
        'F' => 147.068414,
        'U' => 150.953636,
        'R' => 156.101111,
        'Y' => 163.06332,
        'W' => 186.079313,
        'O' => 237.147727,
        _ => return None,
    };
    Some(mass)
}

pub fn peptide_neutral_mass(sequence: &str) -> Option<f64> {
    if sequence.is_empty() {
        return None;
    }
    sequence
        .chars()
        .try_fold(WATER, |total, residue| residue_mass(residue).map(|mass| total + mass))
}

#[inline]
pub fn mass_charge_ratio(mass: f64, z: i32) -> f64 {
    (mass + z as f64 * PROTON) / z.abs() as f64
}

#[inline]
pub fn neutral_mass(mz: f64, z: i32) -> f64 {
    mz * z.abs() as f64 - z as f64 * PROTON
}

pub fn delta_mz(sequence: &str, observed_mz: f64, charge: i32, ptm_masses: &[f64]) -> Option<f64> {
    if charge == 0 {
        return None;
    }
    let mass = peptide_neutral_mass(sequence)? + ptm_masses.iter().sum::<f64>();
    Some(observed_mz - mass_charge_ratio(mass, charge))
}

pub fn within_tolerance(delta: f64, tolerance: f64) -> bool {
    delta.abs() <= tolerance
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peptide_mass_matches_reference() {
        // PEPTIDE monoisotopic neutral mass
        let mass = peptide_neutral_mass("PEPTIDE").unwrap();
        assert!((mass - 799.359964).abs() < 1e-4);
    }

    #[test]
    fn unknown_residue_has_no_mass() {
        assert!(peptide_neutral_mass("PEPXIDE").is_none());
        assert!(peptide_neutral_mass("").is_none());
    }

    #[test]
    fn doubly_charged_precursor_matches_reference() {
        let mz = mass_charge_ratio(peptide_neutral_mass("PEPTIDE").unwrap(), 2);
        assert!((mz - 400.687258).abs() < 1e-4);
    }

    #[test]
    fn charge_round_trip() {
        for z in [1, 2, 3, 5] {
            let mz = mass_charge_ratio(799.359964, z);
            assert!((neutral_mass(mz, z) - 799.359964).abs() < 1e-9);
        }
    }

    #[test]
    fn exact_precursor_is_in_tolerance_at_high_charge() {
        let mass = peptide_neutral_mass("PEPTIDE").unwrap();
        let observed = (mass + 5.0 * PROTON) / 5.0;
        let delta = delta_mz("PEPTIDE", observed, 5, &[]).unwrap();
        assert!(delta.abs() < 1e-9);
    }

    #[test]
    fn delta_respects_modifications() {
        let observed = mass_charge_ratio(799.359964 + 15.994915, 2);
        let delta = delta_mz("PEPTIDE", observed, 2, &[15.994915]).unwrap();
        assert!(within_tolerance(delta, 1e-3));

        let unmodified = delta_mz("PEPTIDE", observed, 2, &[]).unwrap();
        assert!((unmodified - 15.994915 / 2.0).abs() < 1e-6);
        assert!(!within_tolerance(unmodified, DEFAULT_DELTA_MZ_TOLERANCE));
        assert!(delta_mz("PEPTIDE", observed, 0, &[]).is_none());
    }
}
