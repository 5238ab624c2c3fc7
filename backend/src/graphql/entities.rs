//! Entity queries and mutations
//!
//! The whole entity API is generated from the table at the bottom of this
//! file. Each row names one entity kind and the GraphQL fields it gets; all
//! of them resolve through the generic functions in `operations`.

use async_graphql::{Context, ErrorExtensions, Object, Result};
use uuid::Uuid;

use super::auth::AuthExt;
use super::operations;
use super::pagination::PaginationArgs;
use super::types::{CloneResult, DeleteResult, Entity, EntityConnection, ExportResult};
use crate::gmp::entity::*;

macro_rules! entity_operations {
    ($(
        $kind:ident => {
            get: $get:ident $(as $get_name:literal)?,
            list: $list:ident,
            $(clone: $clone:ident,)?
            delete: ($delete_ids:ident, $delete_filter:ident),
            export: ($export_ids:ident, $export_filter:ident) $(,)?
        }
    ),* $(,)?) => {
        #[derive(Default)]
        pub struct EntityQueries;

        #[Object]
        impl EntityQueries {
            $(
                $(#[graphql(name = $get_name)])?
                async fn $get(&self, ctx: &Context<'_>, id: Uuid) -> Result<Option<Entity>> {
                    operations::get(ctx.gmp()?, &$kind, id)
                        .await
                        .map_err(|e| e.extend())
                }

                async fn $list(
                    &self,
                    ctx: &Context<'_>,
                    filter_string: Option<String>,
                    first: Option<i32>,
                    last: Option<i32>,
                    after: Option<String>,
                    before: Option<String>,
                ) -> Result<EntityConnection> {
                    let gmp = ctx.gmp()?;
                    let args = PaginationArgs { first, last, after, before };
                    let connection = operations::list(gmp, &$kind, filter_string.as_deref(), &args)
                        .await
                        .map_err(|e| e.extend())?;
                    Ok(EntityConnection::from_connection(connection))
                }
            )*
        }

        #[derive(Default)]
        pub struct EntityMutations;

        #[Object]
        impl EntityMutations {
            $(
                $(
                    async fn $clone(&self, ctx: &Context<'_>, id: Uuid) -> Result<CloneResult> {
                        let id = operations::clone(ctx.gmp()?, &$kind, id)
                            .await
                            .map_err(|e| e.extend())?;
                        Ok(CloneResult { id })
                    }
                )?

                async fn $delete_ids(&self, ctx: &Context<'_>, ids: Vec<Uuid>) -> Result<DeleteResult> {
                    let ok = operations::delete_by_ids(ctx.gmp()?, &$kind, &ids)
                        .await
                        .map_err(|e| e.extend())?;
                    Ok(DeleteResult { ok })
                }

                async fn $delete_filter(
                    &self,
                    ctx: &Context<'_>,
                    filter_string: String,
                ) -> Result<DeleteResult> {
                    let ok = operations::delete_by_filter(ctx.gmp()?, &$kind, &filter_string)
                        .await
                        .map_err(|e| e.extend())?;
                    Ok(DeleteResult { ok })
                }

                async fn $export_ids(&self, ctx: &Context<'_>, ids: Vec<Uuid>) -> Result<ExportResult> {
                    let exported_entities = operations::export_by_ids(ctx.gmp()?, &$kind, &ids)
                        .await
                        .map_err(|e| e.extend())?;
                    Ok(ExportResult { exported_entities })
                }

                async fn $export_filter(
                    &self,
                    ctx: &Context<'_>,
                    filter_string: String,
                ) -> Result<ExportResult> {
                    let exported_entities =
                        operations::export_by_filter(ctx.gmp()?, &$kind, &filter_string)
                            .await
                            .map_err(|e| e.extend())?;
                    Ok(ExportResult { exported_entities })
                }
            )*
        }
    };
}

entity_operations! {
    ALERT => {
        get: alert,
        list: alerts,
        clone: clone_alert,
        delete: (delete_alerts_by_ids, delete_alerts_by_filter),
        export: (export_alerts_by_ids, export_alerts_by_filter),
    },
    SCAN_CONFIG => {
        get: scan_config,
        list: scan_configs,
        clone: clone_scan_config,
        delete: (delete_scan_configs_by_ids, delete_scan_configs_by_filter),
        export: (export_scan_configs_by_ids, export_scan_configs_by_filter),
    },
    CREDENTIAL => {
        get: credential,
        list: credentials,
        clone: clone_credential,
        delete: (delete_credentials_by_ids, delete_credentials_by_filter),
        export: (export_credentials_by_ids, export_credentials_by_filter),
    },
    FILTER => {
        get: filter,
        list: filters,
        clone: clone_filter,
        delete: (delete_filters_by_ids, delete_filters_by_filter),
        export: (export_filters_by_ids, export_filters_by_filter),
    },
    GROUP => {
        get: group,
        list: groups,
        clone: clone_group,
        delete: (delete_groups_by_ids, delete_groups_by_filter),
        export: (export_groups_by_ids, export_groups_by_filter),
    },
    HOST => {
        get: host,
        list: hosts,
        delete: (delete_hosts_by_ids, delete_hosts_by_filter),
        export: (export_hosts_by_ids, export_hosts_by_filter),
    },
    NOTE => {
        get: note,
        list: notes,
        clone: clone_note,
        delete: (delete_notes_by_ids, delete_notes_by_filter),
        export: (export_notes_by_ids, export_notes_by_filter),
    },
    OPERATING_SYSTEM => {
        get: operating_system,
        list: operating_systems,
        delete: (delete_operating_systems_by_ids, delete_operating_systems_by_filter),
        export: (export_operating_systems_by_ids, export_operating_systems_by_filter),
    },
    OVERRIDE => {
        get: override_ as "override",
        list: overrides,
        clone: clone_override,
        delete: (delete_overrides_by_ids, delete_overrides_by_filter),
        export: (export_overrides_by_ids, export_overrides_by_filter),
    },
    PERMISSION => {
        get: permission,
        list: permissions,
        clone: clone_permission,
        delete: (delete_permissions_by_ids, delete_permissions_by_filter),
        export: (export_permissions_by_ids, export_permissions_by_filter),
    },
    PORT_LIST => {
        get: port_list,
        list: port_lists,
        clone: clone_port_list,
        delete: (delete_port_lists_by_ids, delete_port_lists_by_filter),
        export: (export_port_lists_by_ids, export_port_lists_by_filter),
    },
    REPORT => {
        get: report,
        list: reports,
        delete: (delete_reports_by_ids, delete_reports_by_filter),
        export: (export_reports_by_ids, export_reports_by_filter),
    },
    REPORT_FORMAT => {
        get: report_format,
        list: report_formats,
        clone: clone_report_format,
        delete: (delete_report_formats_by_ids, delete_report_formats_by_filter),
        export: (export_report_formats_by_ids, export_report_formats_by_filter),
    },
    ROLE => {
        get: role,
        list: roles,
        clone: clone_role,
        delete: (delete_roles_by_ids, delete_roles_by_filter),
        export: (export_roles_by_ids, export_roles_by_filter),
    },
    SCANNER => {
        get: scanner,
        list: scanners,
        clone: clone_scanner,
        delete: (delete_scanners_by_ids, delete_scanners_by_filter),
        export: (export_scanners_by_ids, export_scanners_by_filter),
    },
    SCHEDULE => {
        get: schedule,
        list: schedules,
        clone: clone_schedule,
        delete: (delete_schedules_by_ids, delete_schedules_by_filter),
        export: (export_schedules_by_ids, export_schedules_by_filter),
    },
    TAG => {
        get: tag,
        list: tags,
        clone: clone_tag,
        delete: (delete_tags_by_ids, delete_tags_by_filter),
        export: (export_tags_by_ids, export_tags_by_filter),
    },
    TARGET => {
        get: target,
        list: targets,
        clone: clone_target,
        delete: (delete_targets_by_ids, delete_targets_by_filter),
        export: (export_targets_by_ids, export_targets_by_filter),
    },
    TASK => {
        get: task,
        list: tasks,
        clone: clone_task,
        delete: (delete_tasks_by_ids, delete_tasks_by_filter),
        export: (export_tasks_by_ids, export_tasks_by_filter),
    },
    TICKET => {
        get: ticket,
        list: tickets,
        clone: clone_ticket,
        delete: (delete_tickets_by_ids, delete_tickets_by_filter),
        export: (export_tickets_by_ids, export_tickets_by_filter),
    },
    TLS_CERTIFICATE => {
        get: tls_certificate,
        list: tls_certificates,
        clone: clone_tls_certificate,
        delete: (delete_tls_certificates_by_ids, delete_tls_certificates_by_filter),
        export: (export_tls_certificates_by_ids, export_tls_certificates_by_filter),
    },
    USER => {
        get: user,
        list: users,
        clone: clone_user,
        delete: (delete_users_by_ids, delete_users_by_filter),
        export: (export_users_by_ids, export_users_by_filter),
    },
}
