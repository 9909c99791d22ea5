use redb::TableDefinition;

/// File records: id -> FileRecord (msgpack)
pub const FILES: TableDefinition<u64, &[u8]> = TableDefinition::new("files");

/// File content: id -> raw bytes
pub const FILE_CONTENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("file_contents");

/// Monotonic counters: name -> next value
pub const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");

/// Counter key for the next file id
pub const NEXT_FILE_ID: &str = "next_file_id";
