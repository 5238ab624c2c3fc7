//! Entity type descriptors
//!
//! Every remotely managed object kind (alert, target, role, ...) is described
//! by one static [`EntityType`]. The descriptor carries everything the generic
//! query and mutation machinery needs: the GMP element name, the plural used
//! by `get_<plural>` commands, an optional asset type, which commands the kind
//! supports, and the table of extra scalar fields exposed on the entity.

use super::xml::XmlElement;

/// How a named field is pulled out of an entity element
#[derive(Debug, Clone, Copy)]
pub enum Extract {
    /// Text of the element at a slash separated path
    Text(&'static str),
    /// Attribute of the element at a path
    Attr(&'static str, &'static str),
    /// Anything that does not fit the simple cases
    Custom(fn(&XmlElement) -> Option<String>),
}

impl Extract {
    pub fn apply(&self, element: &XmlElement) -> Option<String> {
        match self {
            Extract::Text(path) => element.child_text(path).map(str::to_string),
            Extract::Attr(path, attr) => element
                .child(path)
                .and_then(|e| e.attr(attr))
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            Extract::Custom(f) => f(element),
        }
    }
}

/// A named scalar field of an entity
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub extract: Extract,
}

const fn text(name: &'static str, path: &'static str) -> Field {
    Field {
        name,
        extract: Extract::Text(path),
    }
}

const fn attr(name: &'static str, path: &'static str, attr: &'static str) -> Field {
    Field {
        name,
        extract: Extract::Attr(path, attr),
    }
}

#[derive(Debug)]
pub struct EntityType {
    /// Element and command name, e.g. `port_list`
    pub name: &'static str,
    /// Used by `get_<plural>` and the requested-window element
    pub plural: &'static str,
    /// Assets share one command set and are told apart by `type`
    pub asset_type: Option<&'static str>,
    /// Supports `create_<name>` with `<copy>`
    pub clonable: bool,
    /// Deleted entities go to the trashcan (`ultimate="0"`)
    pub trashcan: bool,
    pub fields: &'static [Field],
}

impl EntityType {
    pub fn id_attribute(&self) -> String {
        format!("{}_id", self.name)
    }

    pub fn count_element(&self) -> String {
        format!("{}_count", self.name)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl PartialEq for EntityType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.asset_type == other.asset_type
    }
}

fn role_names(element: &XmlElement) -> Option<String> {
    let names: Vec<&str> = element
        .children_named("role")
        .filter_map(|r| r.child_text("name"))
        .collect();
    (!names.is_empty()).then(|| names.join(", "))
}

fn port_range_count(element: &XmlElement) -> Option<String> {
    element
        .child("port_ranges")
        .map(|ranges| ranges.children_named("port_range").count().to_string())
}

pub static ALERT: EntityType = EntityType {
    name: "alert",
    plural: "alerts",
    asset_type: None,
    clonable: true,
    trashcan: true,
    fields: &[
        text("active", "active"),
        text("event", "event"),
        text("condition", "condition"),
        text("method", "method"),
        attr("filterId", "filter", "id"),
    ],
};

pub static SCAN_CONFIG: EntityType = EntityType {
    name: "config",
    plural: "configs",
    asset_type: None,
    clonable: true,
    trashcan: true,
    fields: &[
        text("familyCount", "family_count"),
        text("nvtCount", "nvt_count"),
        text("type", "type"),
        text("predefined", "predefined"),
    ],
};

pub static CREDENTIAL: EntityType = EntityType {
    name: "credential",
    plural: "credentials",
    asset_type: None,
    clonable: true,
    trashcan: true,
    fields: &[
        text("login", "login"),
        text("type", "type"),
        text("fullType", "full_type"),
        text("allowInsecure", "allow_insecure"),
    ],
};

pub static FILTER: EntityType = EntityType {
    name: "filter",
    plural: "filters",
    asset_type: None,
    clonable: true,
    trashcan: true,
    fields: &[text("term", "term"), text("type", "type")],
};

pub static GROUP: EntityType = EntityType {
    name: "group",
    plural: "groups",
    asset_type: None,
    clonable: true,
    trashcan: true,
    fields: &[text("users", "users")],
};

pub static HOST: EntityType = EntityType {
    name: "asset",
    plural: "assets",
    asset_type: Some("host"),
    clonable: false,
    trashcan: false,
    fields: &[
        text("severity", "host/severity/value"),
        text("hostname", "host/hostname"),
    ],
};

pub static NOTE: EntityType = EntityType {
    name: "note",
    plural: "notes",
    asset_type: None,
    clonable: true,
    trashcan: true,
    fields: &[
        text("text", "text"),
        text("active", "active"),
        attr("nvtId", "nvt", "oid"),
        text("severity", "severity"),
        text("hosts", "hosts"),
        text("port", "port"),
    ],
};

pub static OPERATING_SYSTEM: EntityType = EntityType {
    name: "asset",
    plural: "assets",
    asset_type: Some("os"),
    clonable: false,
    trashcan: false,
    fields: &[
        text("title", "os/title"),
        text("latestSeverity", "os/latest_severity/value"),
        text("highestSeverity", "os/highest_severity/value"),
        text("averageSeverity", "os/average_severity/value"),
        text("hosts", "os/hosts"),
        text("installs", "os/installs"),
    ],
};

pub static OVERRIDE: EntityType = EntityType {
    name: "override",
    plural: "overrides",
    asset_type: None,
    clonable: true,
    trashcan: true,
    fields: &[
        text("text", "text"),
        text("active", "active"),
        attr("nvtId", "nvt", "oid"),
        text("severity", "severity"),
        text("newSeverity", "new_severity"),
        text("hosts", "hosts"),
        text("port", "port"),
    ],
};

pub static PERMISSION: EntityType = EntityType {
    name: "permission",
    plural: "permissions",
    asset_type: None,
    clonable: true,
    trashcan: true,
    fields: &[
        attr("resourceId", "resource", "id"),
        text("resourceType", "resource/type"),
        attr("subjectId", "subject", "id"),
        text("subjectType", "subject/type"),
    ],
};

pub static PORT_LIST: EntityType = EntityType {
    name: "port_list",
    plural: "port_lists",
    asset_type: None,
    clonable: true,
    trashcan: true,
    fields: &[
        text("portCountAll", "port_count/all"),
        text("portCountTcp", "port_count/tcp"),
        text("portCountUdp", "port_count/udp"),
        text("predefined", "predefined"),
        Field {
            name: "portRangeCount",
            extract: Extract::Custom(port_range_count),
        },
    ],
};

pub static REPORT: EntityType = EntityType {
    name: "report",
    plural: "reports",
    asset_type: None,
    clonable: false,
    trashcan: false,
    fields: &[
        text("scanRunStatus", "report/scan_run_status"),
        text("timestamp", "report/timestamp"),
        attr("taskId", "task", "id"),
        text("taskName", "task/name"),
    ],
};

pub static REPORT_FORMAT: EntityType = EntityType {
    name: "report_format",
    plural: "report_formats",
    asset_type: None,
    clonable: true,
    trashcan: true,
    fields: &[
        text("extension", "extension"),
        text("contentType", "content_type"),
        text("active", "active"),
        text("predefined", "predefined"),
    ],
};

pub static ROLE: EntityType = EntityType {
    name: "role",
    plural: "roles",
    asset_type: None,
    clonable: true,
    trashcan: true,
    fields: &[text("users", "users")],
};

pub static SCANNER: EntityType = EntityType {
    name: "scanner",
    plural: "scanners",
    asset_type: None,
    clonable: true,
    trashcan: true,
    fields: &[
        text("host", "host"),
        text("port", "port"),
        text("type", "type"),
        attr("credentialId", "credential", "id"),
    ],
};

pub static SCHEDULE: EntityType = EntityType {
    name: "schedule",
    plural: "schedules",
    asset_type: None,
    clonable: true,
    trashcan: true,
    fields: &[text("icalendar", "icalendar"), text("timezone", "timezone")],
};

pub static TAG: EntityType = EntityType {
    name: "tag",
    plural: "tags",
    asset_type: None,
    clonable: true,
    trashcan: true,
    fields: &[
        text("value", "value"),
        text("active", "active"),
        text("resourceType", "resources/type"),
        text("resourceCount", "resources/count/total"),
    ],
};

pub static TARGET: EntityType = EntityType {
    name: "target",
    plural: "targets",
    asset_type: None,
    clonable: true,
    trashcan: true,
    fields: &[
        text("hosts", "hosts"),
        text("excludeHosts", "exclude_hosts"),
        text("maxHosts", "max_hosts"),
        attr("portListId", "port_list", "id"),
        text("aliveTests", "alive_tests"),
        text("allowSimultaneousIps", "allow_simultaneous_ips"),
        text("reverseLookupOnly", "reverse_lookup_only"),
        text("reverseLookupUnify", "reverse_lookup_unify"),
    ],
};

pub static TASK: EntityType = EntityType {
    name: "task",
    plural: "tasks",
    asset_type: None,
    clonable: true,
    trashcan: true,
    fields: &[
        text("status", "status"),
        text("progress", "progress"),
        text("alterable", "alterable"),
        attr("configId", "config", "id"),
        attr("targetId", "target", "id"),
        attr("scannerId", "scanner", "id"),
        attr("lastReportId", "last_report/report", "id"),
    ],
};

pub static TICKET: EntityType = EntityType {
    name: "ticket",
    plural: "tickets",
    asset_type: None,
    clonable: true,
    trashcan: true,
    fields: &[
        text("status", "status"),
        text("host", "host"),
        text("location", "location"),
        text("solutionType", "solution_type"),
        attr("assignedUserId", "assigned_to/user", "id"),
    ],
};

pub static TLS_CERTIFICATE: EntityType = EntityType {
    name: "tls_certificate",
    plural: "tls_certificates",
    asset_type: None,
    clonable: true,
    trashcan: true,
    fields: &[
        text("certificateFormat", "certificate_format"),
        text("sha256Fingerprint", "sha256_fingerprint"),
        text("md5Fingerprint", "md5_fingerprint"),
        text("subjectDn", "subject_dn"),
        text("issuerDn", "issuer_dn"),
        text("activationTime", "activation_time"),
        text("expirationTime", "expiration_time"),
        text("timeStatus", "time_status"),
        text("lastSeen", "last_seen"),
    ],
};

pub static USER: EntityType = EntityType {
    name: "user",
    plural: "users",
    asset_type: None,
    clonable: true,
    trashcan: false,
    fields: &[
        text("hosts", "hosts"),
        text("authMethod", "sources/source"),
        Field {
            name: "roles",
            extract: Extract::Custom(role_names),
        },
    ],
};
