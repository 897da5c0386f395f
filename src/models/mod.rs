pub mod event;
pub mod stats;
pub mod telemetry;
pub mod truck;

/// 64-bit ids lose precision in JavaScript consumers, so they serialize to
/// JSON as strings.
pub mod id_string {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(id: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(id)
    }
}

pub mod opt_id_string {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(id: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error> {
        match id {
            Some(v) => serializer.collect_str(v),
            None => serializer.serialize_none(),
        }
    }
}
