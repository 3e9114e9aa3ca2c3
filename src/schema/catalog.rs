// Entity declarations for every catalog exposed by the service.

use super::{
    AccessRule, DefaultValue, EntitySchema, FieldKind, FieldSpec, Flavor, Generated, IdentityKind,
    Render,
};

// ---------------------------------------------------------------------------
// Music catalog
// ---------------------------------------------------------------------------

pub static RECORD_LABEL: EntitySchema = EntitySchema {
    name: "record_labels",
    title: "Record label",
    model: "recordlabel",
    identity: IdentityKind::Serial,
    flavor: Flavor::Relational,
    access: AccessRule::Authenticated,
    fields: &[
        FieldSpec::text("name", 100).required(),
        FieldSpec::text("address", 300).required(),
        FieldSpec::new("email", FieldKind::Email { max_length: 254 }).required(),
    ],
    default_limit: None,
};

pub static MUSICIAN: EntitySchema = EntitySchema {
    name: "musicians",
    title: "Musician",
    model: "musician",
    identity: IdentityKind::Serial,
    flavor: Flavor::Relational,
    access: AccessRule::AgentOwned { owner_field: "agent" },
    fields: &[
        FieldSpec::text("first_name", 30).required(),
        FieldSpec::text("last_name", 30).required(),
        FieldSpec::text("instrument", 50).required(),
        FieldSpec::new("agent", FieldKind::Reference { target: "users" })
            .generated(Generated::Caller)
            .render(Render::Lookup { key: "agent_username", field: "username" }),
    ],
    default_limit: None,
};

pub static ALBUM: EntitySchema = EntitySchema {
    name: "albums",
    title: "Album",
    model: "album",
    identity: IdentityKind::Serial,
    flavor: Flavor::Relational,
    access: AccessRule::ModelPermission,
    fields: &[
        FieldSpec::text("title", 200).required(),
        FieldSpec::text("artist", 200).required(),
        FieldSpec::new("release_date", FieldKind::Date).required(),
        FieldSpec::text("genre", 100).required(),
        FieldSpec::new("label", FieldKind::Reference { target: "record_labels" })
            .required()
            .render(Render::Nested),
        FieldSpec::new("album_members", FieldKind::ReferenceList { target: "musicians" })
            .default_to(DefaultValue::Strings(&[]))
            .render(Render::Nested),
    ],
    default_limit: None,
};

// ---------------------------------------------------------------------------
// Club catalog
// ---------------------------------------------------------------------------

pub static CLUB_MEMBER: EntitySchema = EntitySchema {
    name: "club_members",
    title: "Club member",
    model: "clubmember",
    identity: IdentityKind::Serial,
    flavor: Flavor::Relational,
    access: AccessRule::Authenticated,
    fields: &[
        FieldSpec::text("first_name", 30).required(),
        FieldSpec::text("last_name", 30).required(),
    ],
    default_limit: None,
};

pub static VENUE: EntitySchema = EntitySchema {
    name: "venues",
    title: "Venue",
    model: "venue",
    identity: IdentityKind::Serial,
    flavor: Flavor::Relational,
    access: AccessRule::Authenticated,
    fields: &[
        FieldSpec::text("name", 120).required(),
        FieldSpec::text("address", 300).required(),
        FieldSpec::text("post_code", 4).required(),
        FieldSpec::text("phone", 10).required(),
        FieldSpec::new("website", FieldKind::Url { max_length: 200 }).required(),
        FieldSpec::new("email_address", FieldKind::Email { max_length: 254 }).required(),
    ],
    default_limit: None,
};

pub static EVENT: EntitySchema = EntitySchema {
    name: "events",
    title: "Event",
    model: "event",
    identity: IdentityKind::Serial,
    flavor: Flavor::Relational,
    access: AccessRule::Authenticated,
    fields: &[
        FieldSpec::text("name", 120).required(),
        FieldSpec::new("event_date", FieldKind::DateTime).required(),
        FieldSpec::text("manager", 50).required(),
        FieldSpec::new("description", FieldKind::Text { max_length: None }),
        FieldSpec::new("venue", FieldKind::Reference { target: "venues" }).render(Render::Nested),
        FieldSpec::new("attendees", FieldKind::ReferenceList { target: "club_members" })
            .default_to(DefaultValue::Strings(&[])),
    ],
    default_limit: None,
};

// ---------------------------------------------------------------------------
// Todos
// ---------------------------------------------------------------------------

pub static TODO: EntitySchema = EntitySchema {
    name: "todos",
    title: "Todo",
    model: "todo",
    identity: IdentityKind::Serial,
    flavor: Flavor::Relational,
    access: AccessRule::CallerOwned { owner_field: "user" },
    fields: &[
        FieldSpec::text("task", 180).required(),
        FieldSpec::new("completed", FieldKind::Boolean).default_to(DefaultValue::Bool(false)),
        FieldSpec::new("timestamp", FieldKind::DateTime).generated(Generated::CreatedAt),
        FieldSpec::new("updated", FieldKind::DateTime).generated(Generated::UpdatedAt),
        FieldSpec::new("user", FieldKind::Reference { target: "users" })
            .generated(Generated::Caller)
            .render(Render::Hidden),
    ],
    default_limit: None,
};

// ---------------------------------------------------------------------------
// Document collections
// ---------------------------------------------------------------------------

static PROFILE_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("first_name", 150),
    FieldSpec::text("last_name", 150),
    FieldSpec::new("email", FieldKind::Email { max_length: 254 }),
];

pub static USER: EntitySchema = EntitySchema {
    name: "users",
    title: "User",
    model: "user",
    identity: IdentityKind::Object,
    flavor: Flavor::Document,
    access: AccessRule::SelfManaged,
    fields: &[
        FieldSpec::text("username", 150).required(),
        FieldSpec::new("password", FieldKind::Password).required().render(Render::Hidden),
        FieldSpec::new("roles", FieldKind::TextList)
            .default_to(DefaultValue::Strings(&["user"]))
            .admin_only(),
        FieldSpec::new("last_login", FieldKind::DateTime).generated(Generated::CreatedAt),
        FieldSpec::new("profile_data", FieldKind::Object { fields: PROFILE_FIELDS }),
    ],
    default_limit: None,
};

pub static METEORITE_LANDING: EntitySchema = EntitySchema {
    name: "meteorite_landings",
    title: "Record",
    model: "meteoritelanding",
    identity: IdentityKind::Object,
    flavor: Flavor::Document,
    access: AccessRule::Open,
    fields: &[
        FieldSpec::new("name", FieldKind::Text { max_length: None }),
        FieldSpec::new("id", FieldKind::Integer),
        FieldSpec::new("nametype", FieldKind::Text { max_length: None }),
        FieldSpec::new("recclass", FieldKind::Text { max_length: None }),
        FieldSpec::new("mass (g)", FieldKind::Float),
        FieldSpec::new("fall", FieldKind::Text { max_length: None }),
        FieldSpec::new("year", FieldKind::Text { max_length: None }),
        FieldSpec::new("reclat", FieldKind::Float),
        FieldSpec::new("reclong", FieldKind::Float),
        FieldSpec::new("GeoLocation", FieldKind::Text { max_length: None }),
    ],
    default_limit: Some(10),
};

pub static ALL: &[&EntitySchema] = &[
    &RECORD_LABEL,
    &MUSICIAN,
    &ALBUM,
    &CLUB_MEMBER,
    &VENUE,
    &EVENT,
    &TODO,
    &USER,
    &METEORITE_LANDING,
];
