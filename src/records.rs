//! Answer records describing the latest release of a project.

use hickory_proto::rr::rdata::{PTR, TXT};
use hickory_proto::rr::{DNSClass, Name, RData, Record};
use hickory_proto::ProtoError;

use crate::codec::{encode_v1, latest_alias, ProjectVersion};

/// PTR from `latest.<project>.usage-v1.` to `<version>.<project>.usage-v1.`.
pub fn ptr_record(latest: &ProjectVersion, ttl: u32) -> Result<Record, ProtoError> {
    let owner = Name::from_ascii(latest_alias(&latest.project))?;
    let target = Name::from_ascii(encode_v1(latest))?;

    let mut record = Record::from_rdata(owner, ttl, RData::PTR(PTR(target)));
    record.set_dns_class(DNSClass::IN);
    Ok(record)
}

/// TXT on `latest.<project>.usage-v1.` carrying `project=` and `version=`.
pub fn txt_record(latest: &ProjectVersion, ttl: u32) -> Result<Record, ProtoError> {
    let owner = Name::from_ascii(latest_alias(&latest.project))?;
    let txt = TXT::new(vec![
        format!("project={}", latest.project),
        format!("version={}", latest.version),
    ]);

    let mut record = Record::from_rdata(owner, ttl, RData::TXT(txt));
    record.set_dns_class(DNSClass::IN);
    Ok(record)
}

/// Full answer section for a resolved project: PTR then TXT.
pub fn answer_records(latest: &ProjectVersion, ttl: u32) -> Result<Vec<Record>, ProtoError> {
    Ok(vec![ptr_record(latest, ttl)?, txt_record(latest, ttl)?])
}
