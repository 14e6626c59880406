use std::collections::HashMap;

use alloy_primitives::{Address, U256};
use escrow_core::{
    enums::{ApplicationStatus, JobStatus},
    ids::{ApplicationId, JobId, TxHash},
    job::{Application, Job},
};

fn make_job(id: u64) -> Job {
    Job {
        id: JobId(id),
        poster: Address::repeat_byte(0x01),
        title: "Landing page".to_string(),
        description: "Build a landing page".to_string(),
        reward: U256::from(1_000_000_000_000_000_000u128),
        deadline: 1_700_000_000,
        status: JobStatus::Open,
        assigned_freelancer: Address::ZERO,
    }
}

#[test]
fn ids_serialize_as_plain_numbers() {
    let json = serde_json::to_value(JobId(42)).unwrap();
    assert_eq!(json, serde_json::json!(42));

    let id: ApplicationId = serde_json::from_str("7").unwrap();
    assert_eq!(id, ApplicationId(7));
}

#[test]
fn job_json_carries_id_and_status() {
    let json = serde_json::to_value(make_job(3)).unwrap();
    assert_eq!(json["id"], 3);
    assert_eq!(json["status"], "Open");
    assert_eq!(json["title"], "Landing page");

    let back: Job = serde_json::from_value(json).unwrap();
    assert_eq!(back, make_job(3));
}

#[test]
fn application_keeps_derived_title() {
    let application = Application {
        id: ApplicationId(45),
        job_id: JobId(12),
        job_title: JobId(12).placeholder_title(),
        freelancer: Address::repeat_byte(0x02),
        proposal: "I can do it".to_string(),
        status: ApplicationStatus::Pending,
        timestamp: 1_700_000_100,
    };
    let json = serde_json::to_value(&application).unwrap();
    assert_eq!(json["job_title"], "Job #12");
    assert_eq!(json["status"], "Pending");
}

#[test]
fn tx_hash_displays_as_prefixed_hex() {
    let hash = TxHash([0xab; 32]);
    let text = hash.to_string();
    assert!(text.starts_with("0xabab"));
    assert_eq!(text.len(), 66);
}

#[test]
fn job_id_works_as_hashmap_key() {
    let mut map: HashMap<JobId, Job> = HashMap::new();
    map.insert(JobId(1), make_job(1));
    map.insert(JobId(1), make_job(1));
    assert_eq!(map.len(), 1);
}
