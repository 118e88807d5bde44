use anyhow::Result;
use merge_etl::{
    most_popular_make_by_gender, FullRecordMerger, MergeError, MergeOutcome, MergedRecord,
};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const VEHICLES_HEADER: &str = "ssn,vehicle_make,vehicle_model,model_year\n";
const UPDATES_HEADER: &str = "ssn,last_updated,created\n";
const EMPLOYMENT_HEADER: &str = "employer,department,employee_id,ssn\n";
const PERSONAL_HEADER: &str = "ssn,first_name,last_name,gender,language\n";

/// One aligned person across all four files.
struct Person<'a> {
    ssn: &'a str,
    gender: &'a str,
    make: &'a str,
    last_updated: &'a str,
}

impl<'a> Person<'a> {
    fn new(ssn: &'a str, gender: &'a str, make: &'a str, last_updated: &'a str) -> Self {
        Self {
            ssn,
            gender,
            make,
            last_updated,
        }
    }
}

struct Sources {
    vehicles: String,
    updates: String,
    employment: String,
    personal: String,
}

impl Sources {
    fn from_people(people: &[Person]) -> Self {
        let mut sources = Sources {
            vehicles: VEHICLES_HEADER.to_string(),
            updates: UPDATES_HEADER.to_string(),
            employment: EMPLOYMENT_HEADER.to_string(),
            personal: PERSONAL_HEADER.to_string(),
        };
        for p in people {
            sources
                .vehicles
                .push_str(&format!("{},{},Model {},2012\n", p.ssn, p.make, p.ssn));
            sources.updates.push_str(&format!(
                "{},{},2014-03-15T08:30:00Z\n",
                p.ssn, p.last_updated
            ));
            sources
                .employment
                .push_str(&format!("\"Acme, Inc\",Sales,EMP-{},{}\n", p.ssn, p.ssn));
            sources.personal.push_str(&format!(
                "{},First {},Last {},{},English\n",
                p.ssn, p.ssn, p.ssn, p.gender
            ));
        }
        sources
    }

    fn write(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let files = [
            ("vehicles.csv", &self.vehicles),
            ("update_status.csv", &self.updates),
            ("employment.csv", &self.employment),
            ("personal_info.csv", &self.personal),
        ];
        let mut paths = Vec::new();
        for (name, content) in files {
            let path = dir.join(name);
            std::fs::write(&path, content)?;
            paths.push(path);
        }
        Ok(paths)
    }
}

fn people(n: usize) -> Vec<(String, &'static str)> {
    (1..=n)
        .map(|i| (format!("{:03}-00-{:04}", i, i), "2020-07-01T00:00:00Z"))
        .collect()
}

#[test]
fn test_aligned_files_merge_every_row_in_order() -> Result<()> {
    let dir = TempDir::new()?;
    let ids = people(25);
    let persons: Vec<Person> = ids
        .iter()
        .map(|(ssn, ts)| Person::new(ssn, "F", "Toyota", ts))
        .collect();
    let files = Sources::from_people(&persons).write(dir.path())?;

    let merger = FullRecordMerger::new(&files, None, None)?;
    let records: Vec<MergedRecord> = merger.iter().collect::<merge_etl::Result<_>>()?;

    assert_eq!(records.len(), 25);
    for (record, (ssn, _)) in records.iter().zip(&ids) {
        assert_eq!(&record.ssn, ssn);
        assert_eq!(record.employee_id, format!("EMP-{}", ssn));
        assert_eq!(record.employer, "Acme, Inc");
    }
    Ok(())
}

#[test]
fn test_merger_is_reusable_for_fresh_passes() -> Result<()> {
    let dir = TempDir::new()?;
    let persons = [
        Person::new("1", "F", "Toyota", "2020-07-01T00:00:00Z"),
        Person::new("2", "M", "Honda", "2020-07-01T00:00:00Z"),
    ];
    let files = Sources::from_people(&persons).write(dir.path())?;
    let merger = FullRecordMerger::new(&files, None, None)?;

    assert_eq!(merger.iter().count(), 2);
    assert_eq!((&merger).into_iter().count(), 2);
    Ok(())
}

#[test]
fn test_headerless_files() -> Result<()> {
    let dir = TempDir::new()?;
    let persons = [
        Person::new("1", "F", "Toyota", "2020-07-01T00:00:00Z"),
        Person::new("2", "M", "Honda", "2020-07-01T00:00:00Z"),
    ];
    let mut sources = Sources::from_people(&persons);
    sources.vehicles = sources.vehicles.replace(VEHICLES_HEADER, "");
    sources.updates = sources.updates.replace(UPDATES_HEADER, "");
    sources.employment = sources.employment.replace(EMPLOYMENT_HEADER, "");
    sources.personal = sources.personal.replace(PERSONAL_HEADER, "");
    let files = sources.write(dir.path())?;

    let merger = FullRecordMerger::new(&files, None, Some("01/01/2020"))?.without_headers();
    assert!(merger.max_recorded_date().is_some());
    let keys: Vec<String> = merger
        .iter()
        .map(|r| r.map(|r| r.ssn))
        .collect::<merge_etl::Result<_>>()?;
    assert_eq!(keys, vec!["1", "2"]);
    Ok(())
}

#[test]
fn test_key_mismatch_stops_after_valid_prefix() -> Result<()> {
    let dir = TempDir::new()?;
    let persons = [
        Person::new("1", "F", "Toyota", "2020-07-01T00:00:00Z"),
        Person::new("2", "M", "Honda", "2020-07-01T00:00:00Z"),
        Person::new("3", "F", "Kia", "2020-07-01T00:00:00Z"),
        Person::new("4", "M", "Audi", "2020-07-01T00:00:00Z"),
    ];
    let mut sources = Sources::from_people(&persons);
    sources.employment = sources.employment.replace(",EMP-3,3\n", ",EMP-3,33\n");
    let files = sources.write(dir.path())?;

    let merger = FullRecordMerger::new(&files, None, None)?;
    let mut merged = merger.iter();
    let mut keys = Vec::new();
    let mut errors = Vec::new();
    for item in merged.by_ref() {
        match item {
            Ok(record) => keys.push(record.ssn),
            Err(e) => errors.push(e),
        }
    }

    assert_eq!(keys, vec!["1", "2"]);
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], MergeError::KeyMismatchError { row: 3, .. }));
    assert_eq!(merged.outcome(), MergeOutcome::Aborted);
    Ok(())
}

#[test]
fn test_unreadable_line_shifts_alignment() -> Result<()> {
    let dir = TempDir::new()?;
    let ts = "2020-07-01T00:00:00Z";
    let persons = [
        Person::new("1", "F", "Toyota", ts),
        Person::new("2", "M", "Honda", ts),
        Person::new("3", "F", "Kia", ts),
    ];
    let files = Sources::from_people(&persons).write(dir.path())?;

    // vehicle row 2 is not valid UTF-8, so the reader drops it
    let mut vehicles = VEHICLES_HEADER.as_bytes().to_vec();
    vehicles.extend_from_slice(b"1,Toyota,Model 1,2012\n");
    vehicles.extend_from_slice(b"2,Hon\xff\xfeda,Model 2,2012\n");
    vehicles.extend_from_slice(b"3,Kia,Model 3,2012\n");
    std::fs::write(&files[0], vehicles)?;

    let merger = FullRecordMerger::new(&files, None, None)?;
    let mut merged = merger.iter();
    let items: Vec<_> = merged.by_ref().collect();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().map(|r| r.ssn.as_str()).ok(), Some("1"));
    match &items[1] {
        Err(MergeError::KeyMismatchError { row, keys }) => {
            assert_eq!(*row, 2);
            assert_eq!(keys, &vec!["2", "2", "2", "3"]);
        }
        other => panic!("expected key mismatch, got {other:?}"),
    }
    assert_eq!(merged.outcome(), MergeOutcome::Aborted);
    Ok(())
}

#[test]
fn test_unreadable_last_line_ends_stream_early() -> Result<()> {
    let dir = TempDir::new()?;
    let ts = "2020-07-01T00:00:00Z";
    let persons = [
        Person::new("1", "F", "Toyota", ts),
        Person::new("2", "M", "Honda", ts),
    ];
    let files = Sources::from_people(&persons).write(dir.path())?;

    let mut personal = PERSONAL_HEADER.as_bytes().to_vec();
    personal.extend_from_slice(b"1,First 1,Last 1,F,English\n");
    personal.extend_from_slice(b"2,First \xff,Last 2,M,English\n");
    std::fs::write(&files[3], personal)?;

    let merger = FullRecordMerger::new(&files, None, None)?;
    let mut merged = merger.iter();
    let first = merged.next().and_then(|r| r.ok()).map(|r| r.ssn);
    assert_eq!(first, Some("1".to_string()));
    assert!(merged.next().is_none());
    assert_eq!(
        merged.outcome(),
        MergeOutcome::Exhausted(merge_etl::domain::model::SourceRole::PersonalInfo)
    );
    Ok(())
}

#[test]
fn test_max_recorded_date_filter() -> Result<()> {
    let dir = TempDir::new()?;
    let persons = [
        Person::new("1", "F", "Toyota", "2020-05-01T00:00:00Z"),
        Person::new("2", "M", "Honda", "2020-07-01T00:00:00Z"),
        Person::new("3", "F", "Kia", "2020-06-01T00:00:00Z"),
    ];
    let files = Sources::from_people(&persons).write(dir.path())?;

    let merger = FullRecordMerger::new(&files, None, Some("01/06/2020"))?;
    let keys: Vec<String> = merger
        .iter()
        .map(|r| r.map(|r| r.ssn))
        .collect::<merge_etl::Result<_>>()?;

    // the threshold itself is not "before" the cutoff
    assert_eq!(keys, vec!["2", "3"]);
    Ok(())
}

#[test]
fn test_invalid_date_fails_before_any_file_is_read() {
    let files = ["missing/v.csv", "missing/u.csv", "missing/e.csv", "missing/p.csv"];
    let err = FullRecordMerger::new(&files, None, Some("not-a-date")).unwrap_err();
    assert!(matches!(err, MergeError::InvalidDateFormat { .. }));

    // with a valid date the same missing files only fail once iteration starts
    let merger = FullRecordMerger::new(&files, None, Some("01/06/2020")).unwrap();
    let mut merged = merger.iter();
    assert!(matches!(merged.next(), Some(Err(MergeError::IoError(_)))));
    assert!(merged.next().is_none());
}

#[test]
fn test_max_count_caps_rows_per_file() -> Result<()> {
    let dir = TempDir::new()?;
    let ids = people(10);
    let persons: Vec<Person> = ids
        .iter()
        .map(|(ssn, ts)| Person::new(ssn, "M", "Ford", ts))
        .collect();
    let files = Sources::from_people(&persons).write(dir.path())?;

    let merger = FullRecordMerger::new(&files, Some(4), None)?;
    let mut merged = merger.iter();
    assert_eq!(merged.by_ref().filter(|r| r.is_ok()).count(), 4);
    assert!(matches!(merged.outcome(), MergeOutcome::Exhausted(_)));
    Ok(())
}

#[test]
fn test_bad_timestamp_only_matters_through_alignment() -> Result<()> {
    let dir = TempDir::new()?;
    let persons = [
        Person::new("1", "F", "Toyota", "2020-07-01T00:00:00Z"),
        Person::new("2", "M", "Honda", "2020-07-01T00:00:00Z"),
    ];
    let mut sources = Sources::from_people(&persons);
    // the broken model year drops vehicle row 2, which is also the last row
    sources.vehicles = sources
        .vehicles
        .replace("2,Honda,Model 2,2012", "2,Honda,Model 2,twenty");
    let files = sources.write(dir.path())?;

    let merger = FullRecordMerger::new(&files, None, None)?;
    let mut merged = merger.iter();
    let records: Vec<_> = merged.by_ref().collect();
    assert_eq!(records.len(), 1);
    assert!(records[0].is_ok());
    assert_eq!(
        merged.outcome(),
        MergeOutcome::Exhausted(merge_etl::domain::model::SourceRole::Vehicles)
    );

    let stats = merged.stats();
    let vehicles = stats
        .sources
        .iter()
        .find(|s| s.role == merge_etl::domain::model::SourceRole::Vehicles)
        .unwrap();
    assert_eq!(vehicles.stats.skipped, 1);
    assert_eq!(vehicles.stats.consumed, 2);
    Ok(())
}

#[test]
fn test_most_popular_make_by_gender() -> Result<()> {
    let dir = TempDir::new()?;
    let ts = "2020-07-01T00:00:00Z";
    let persons = [
        Person::new("1", "F", "Toyota", ts),
        Person::new("2", "F", "Toyota", ts),
        Person::new("3", "F", "Honda", ts),
        Person::new("4", "M", "Toyota", ts),
        Person::new("5", "M", "Honda", ts),
    ];
    let files = Sources::from_people(&persons).write(dir.path())?;

    let merger = FullRecordMerger::new(&files, None, None)?;
    let records: Vec<MergedRecord> = merger.iter().collect::<merge_etl::Result<_>>()?;
    let result = most_popular_make_by_gender(&records);

    let expected_f: BTreeSet<String> = ["Toyota".to_string()].into();
    let expected_m: BTreeSet<String> = ["Toyota".to_string(), "Honda".to_string()].into();
    assert_eq!(result["F"].values, expected_f);
    assert_eq!(result["F"].count, 2);
    assert_eq!(result["M"].values, expected_m);
    assert_eq!(result["M"].count, 1);
    Ok(())
}

#[cfg(target_os = "linux")]
fn open_handles_under(dir: &Path) -> usize {
    std::fs::read_dir("/proc/self/fd")
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter_map(|e| std::fs::read_link(e.path()).ok())
                .filter(|target| target.starts_with(dir))
                .count()
        })
        .unwrap_or(0)
}

#[cfg(target_os = "linux")]
#[test]
fn test_abandoned_iteration_releases_file_handles() -> Result<()> {
    let dir = TempDir::new()?;
    let ids = people(6);
    let persons: Vec<Person> = ids
        .iter()
        .map(|(ssn, ts)| Person::new(ssn, "F", "Toyota", ts))
        .collect();
    let files = Sources::from_people(&persons).write(dir.path())?;
    let root = dir.path().canonicalize()?;

    let merger = FullRecordMerger::new(&files, None, None)?;
    let mut merged = merger.iter();
    assert_eq!(open_handles_under(&root), 0);

    let first_two: Vec<_> = merged.by_ref().take(2).collect();
    assert_eq!(first_two.len(), 2);
    assert_eq!(open_handles_under(&root), 4);

    drop(merged);
    assert_eq!(open_handles_under(&root), 0);

    // a completed pass closes everything on its own
    let mut merged = merger.iter();
    assert_eq!(merged.by_ref().count(), 6);
    assert_eq!(open_handles_under(&root), 0);
    Ok(())
}
