use crate::schema::PatientInfo;
use chrono::NaiveDate;
use fake::faker::name::en::*;
use fake::faker::number::en::*;
use fake::{Fake, Faker};
use rand::Rng;
use rand::seq::IndexedRandom;
use std::fs::File;
use std::io::{BufWriter, Write};

const PROVIDERS: [&str; 5] = ["Delta Dental", "MetLife", "Cigna Dental", "Aetna", "Guardian"];

/// Generate a realistic fake patient request for testing
///
/// Roughly one in five requests has no group number, as individual plans
/// don't carry one.
pub fn fake_patient_info() -> PatientInfo {
    let mut rng = rand::rng();
    let dob = NaiveDate::from_ymd_opt(
        rng.random_range(1940..=2015),
        rng.random_range(1..=12),
        rng.random_range(1..=28),
    )
    .unwrap_or_default();
    let group_number = if rng.random_bool(0.8) {
        Some(format!(
            "{}-{}",
            NumberWithFormat("#####").fake::<String>(),
            NumberWithFormat("###").fake::<String>()
        ))
    } else {
        None
    };

    PatientInfo {
        first_name: FirstName().fake(),
        last_name: LastName().fake(),
        date_of_birth: dob.format("%Y-%m-%d").to_string(),
        insurance_provider: PROVIDERS.choose(&mut rng).copied().unwrap_or("Delta Dental").to_string(),
        member_id: format!("M{}", Faker.fake::<u32>()),
        group_number,
    }
}

/// Write multiple fake patient requests to a JSONL file for batch runs
pub fn write_fake_patients_jsonl(path: &str, n: usize) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for _ in 0..n {
        let patient = fake_patient_info();
        let json = serde_json::to_string(&patient)?;
        writeln!(writer, "{}", json)?;
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;
    use tempfile::NamedTempFile;

    #[test]
    fn test_fake_patient_is_valid() {
        for _ in 0..20 {
            let patient = fake_patient_info();
            assert!(patient.validate().is_ok(), "Invalid fake patient: {:?}", patient);
            assert!(PROVIDERS.contains(&patient.insurance_provider.as_str()));
        }
    }

    #[test]
    fn test_write_fake_patients_jsonl() {
        let tmpfile = NamedTempFile::new().unwrap();
        let path = tmpfile.path().to_str().unwrap();
        write_fake_patients_jsonl(path, 5).unwrap();

        let reader = std::io::BufReader::new(File::open(path).unwrap());
        let patients: Vec<PatientInfo> = reader
            .lines()
            .map(|line| serde_json::from_str(&line.unwrap()).unwrap())
            .collect();
        assert_eq!(patients.len(), 5);
    }
}
