// Written by hand to match the cetane migrations in src/migrations.

diesel::table! {
    projects (id) {
        id -> Integer,
        org_id -> Integer,
        name -> Text,
        is_active -> Integer,
        created_at -> Text,
    }
}

diesel::table! {
    files (id) {
        id -> Integer,
        project_id -> Integer,
        name -> Text,
        size -> BigInt,
        mime_type -> Nullable<Text>,
        status -> Text,
        active_version_id -> Nullable<Integer>,
        current_version -> Integer,
        parse_attempt -> Integer,
        parse_error -> Nullable<Text>,
        parse_failure -> Nullable<Text>,
        parse_started_at -> Nullable<Text>,
        parse_completed_at -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
        deleted_at -> Nullable<Text>,
    }
}

diesel::table! {
    file_versions (id) {
        id -> Integer,
        file_id -> Integer,
        version_number -> Integer,
        storage_path -> Text,
        size -> BigInt,
        checksum -> Nullable<Text>,
        metadata -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    parse_tables (id) {
        id -> Integer,
        file_id -> Integer,
        version_id -> Integer,
        attempt -> Integer,
        page_number -> Nullable<Integer>,
        table_index -> Integer,
        table_json -> Text,
        confidence -> Nullable<Double>,
        created_at -> Text,
    }
}

diesel::joinable!(files -> projects (project_id));
diesel::joinable!(parse_tables -> files (file_id));
diesel::joinable!(parse_tables -> file_versions (version_id));

diesel::allow_tables_to_appear_in_same_query!(file_versions, files, parse_tables, projects,);
