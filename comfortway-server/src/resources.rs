//! Business resource collections
//!
//! Every collection follows the same shape: stamp a creation time, write
//! the document, read it back. One [`ResourceService`] serves them all,
//! driven by a static [`ResourceSpec`] per collection.

use std::collections::BTreeMap;
use std::sync::Arc;

use comfortway_core::Role;
use futures::future::join_all;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::store::{timestamp, Document, DocumentStore, Fields, Query, StoreResult};

/// Path segments of the five CRUD routes
#[derive(Debug)]
pub struct RouteNames {
    pub create: &'static str,
    pub list: &'static str,
    pub get: &'static str,
    pub update: &'static str,
    pub delete: &'static str,
}

/// An equality lookup exposed as `GET {mount}/{route}/:value`
#[derive(Debug)]
pub struct Lookup {
    pub route: &'static str,
    pub field: &'static str,
    /// The value is a user id: callers may only list their own
    pub owner: bool,
}

#[derive(Debug)]
pub struct ResourceSpec {
    pub collection: &'static str,
    /// Singular, for messages ("Lead not found")
    pub label: &'static str,
    pub plural: &'static str,
    pub mount: &'static str,
    /// Set on create, newest-first ordering key
    pub timestamp_field: &'static str,
    /// Roles allowed to create and update
    pub writers: &'static [Role],
    pub routes: RouteNames,
    pub lookup: Option<Lookup>,
}

const CREATED_ON: &str = "createdOn";

pub static LEADS: ResourceSpec = ResourceSpec {
    collection: "leads",
    label: "Lead",
    plural: "Leads",
    mount: "/v1/leads",
    timestamp_field: CREATED_ON,
    writers: &Role::ALL,
    routes: RouteNames {
        create: "newLead",
        list: "getAllLeads",
        get: "getLeadById",
        update: "updateLead",
        delete: "deleteLead",
    },
    lookup: Some(Lookup {
        route: "getLeadsByUserId",
        field: "assignee",
        owner: true,
    }),
};

pub static MAINTENANCES: ResourceSpec = ResourceSpec {
    collection: "maintenances",
    label: "Maintenance",
    plural: "Maintenances",
    mount: "/v1/maintenances",
    timestamp_field: CREATED_ON,
    writers: &Role::ALL,
    routes: RouteNames {
        create: "newRequest",
        list: "getAllRequests",
        get: "getRequestById",
        update: "updateRequest",
        delete: "deleteRequest",
    },
    lookup: None,
};

pub static MAINTENANCE_REQUESTS: ResourceSpec = ResourceSpec {
    collection: "maintenanceRequests",
    label: "Maintenance request",
    plural: "Maintenance requests",
    mount: "/v1/maintenanceRequests",
    timestamp_field: CREATED_ON,
    writers: &Role::ALL,
    routes: RouteNames {
        create: "newMaintenanceRequest",
        list: "getAllMaintenanceRequests",
        get: "getMaintenanceRequestById",
        update: "updateMaintenanceRequest",
        delete: "deleteMaintenanceRequest",
    },
    lookup: None,
};

pub static CATEGORIES: ResourceSpec = ResourceSpec {
    collection: "categories",
    label: "Category",
    plural: "Categories",
    mount: "/v1/categories",
    timestamp_field: CREATED_ON,
    writers: &Role::STAFF,
    routes: RouteNames {
        create: "newCategory",
        list: "getAllCategories",
        get: "getCategoryById",
        update: "updateCategory",
        delete: "deleteCategory",
    },
    lookup: None,
};

pub static PRODUCTS: ResourceSpec = ResourceSpec {
    collection: "products",
    label: "Product",
    plural: "Products",
    mount: "/v1/products",
    timestamp_field: "createdAt",
    writers: &Role::STAFF,
    routes: RouteNames {
        create: "newProduct",
        list: "getallProducts",
        get: "getProductById",
        update: "updateProduct",
        delete: "deleteProduct",
    },
    lookup: Some(Lookup {
        route: "getProductsByCategory",
        field: "category",
        owner: false,
    }),
};

pub static SERVICES: ResourceSpec = ResourceSpec {
    collection: "services",
    label: "Service",
    plural: "Services",
    mount: "/v1/services",
    timestamp_field: CREATED_ON,
    writers: &Role::STAFF,
    routes: RouteNames {
        create: "newService",
        list: "getAllServices",
        get: "getServiceById",
        update: "updateService",
        delete: "deleteService",
    },
    lookup: None,
};

pub static PROTECTION_PLANS: ResourceSpec = ResourceSpec {
    collection: "protectionPlans",
    label: "Protection plan",
    plural: "Protection plans",
    mount: "/v1/protectionPlans",
    timestamp_field: CREATED_ON,
    writers: &Role::STAFF,
    routes: RouteNames {
        create: "createProtectionPlan",
        list: "getProtectionPlans",
        get: "getProtectionPlanById",
        update: "updateProtectionPlan",
        delete: "deleteProtectionPlan",
    },
    lookup: None,
};

pub static PRODUCT_PLANS: ResourceSpec = ResourceSpec {
    collection: "productPlans",
    label: "Product plan",
    plural: "Product plans",
    mount: "/v1/productPlans",
    timestamp_field: CREATED_ON,
    writers: &Role::STAFF,
    routes: RouteNames {
        create: "createProductPlan",
        list: "getProductPlans",
        get: "getProductPlanById",
        update: "updateProductPlan",
        delete: "deleteProductPlan",
    },
    lookup: None,
};

pub static TASKS: ResourceSpec = ResourceSpec {
    collection: "tasks",
    label: "Task",
    plural: "Tasks",
    mount: "/v1/tasks",
    timestamp_field: CREATED_ON,
    writers: &Role::ALL,
    routes: RouteNames {
        create: "newTask",
        list: "getAllTasks",
        get: "getTaskById",
        update: "updateTask",
        delete: "deleteTask",
    },
    lookup: Some(Lookup {
        route: "getTasksByUserId",
        field: ASSIGNEE,
        owner: true,
    }),
};

pub static ROLES: ResourceSpec = ResourceSpec {
    collection: "roles",
    label: "Role",
    plural: "Roles",
    mount: "/v1/roles",
    timestamp_field: CREATED_ON,
    writers: &Role::STAFF,
    routes: RouteNames {
        create: "newRole",
        list: "getAllRoles",
        get: "getRoleById",
        update: "updateRole",
        delete: "deleteRole",
    },
    lookup: None,
};

pub static SERVICE_HISTORY: ResourceSpec = ResourceSpec {
    collection: "serviceHistory",
    label: "Service history",
    plural: "Service histories",
    mount: "/v1/serviceHistory",
    timestamp_field: CREATED_ON,
    writers: &Role::ALL,
    routes: RouteNames {
        create: "createServiceHistory",
        list: "getServiceHistories",
        get: "getServiceHistoryById",
        update: "updateServiceHistory",
        delete: "deleteServiceHistory",
    },
    lookup: Some(Lookup {
        route: "getServiceHistoriesByUserId",
        field: "userId",
        owner: true,
    }),
};

pub static PURCHASED_PLANS: ResourceSpec = ResourceSpec {
    collection: "purchasedPlans",
    label: "Purchased plan",
    plural: "Purchased plans",
    mount: "/v1/purchasedPlans",
    timestamp_field: CREATED_ON,
    writers: &Role::ALL,
    routes: RouteNames {
        create: "newPurchasedPlan",
        list: "getAllPurchasedPlans",
        get: "getPurchasedPlanById",
        update: "updatePurchasedPlan",
        delete: "deletePurchasedPlan",
    },
    lookup: Some(Lookup {
        route: "getPurchasedPlansByUserId",
        field: "userId",
        owner: true,
    }),
};

/// Every mounted collection
pub static RESOURCES: [&ResourceSpec; 12] = [
    &LEADS,
    &MAINTENANCES,
    &MAINTENANCE_REQUESTS,
    &CATEGORIES,
    &PRODUCTS,
    &SERVICES,
    &PROTECTION_PLANS,
    &PRODUCT_PLANS,
    &TASKS,
    &ROLES,
    &SERVICE_HISTORY,
    &PURCHASED_PLANS,
];

/// Field holding the user a task (or lead) is assigned to
pub const ASSIGNEE: &str = "assignee";

/// Outcome of a bulk task assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAssignment {
    pub requested: usize,
    pub assigned: Vec<String>,
    pub failed: Vec<String>,
    pub message: String,
}

pub struct ResourceService<D> {
    store: Arc<D>,
}

impl<D> Clone for ResourceService<D> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<D: DocumentStore> ResourceService<D> {
    pub fn new(store: Arc<D>) -> Self {
        Self { store }
    }

    pub async fn create(&self, spec: &ResourceSpec, mut body: Fields) -> StoreResult<Document> {
        body.remove("id");
        body.insert(
            spec.timestamp_field.to_string(),
            Value::String(timestamp::format(&timestamp::now())),
        );

        let doc = self.store.insert(spec.collection, body).await?;
        tracing::debug!(collection = spec.collection, id = %doc.id, "Document created");
        Ok(doc)
    }

    /// Newest first
    pub async fn list(&self, spec: &ResourceSpec) -> StoreResult<Vec<Document>> {
        self.store
            .query(spec.collection, &Query::new().order_by_desc(spec.timestamp_field))
            .await
    }

    pub async fn get(&self, spec: &ResourceSpec, id: &str) -> StoreResult<Document> {
        self.store
            .get(spec.collection, id)
            .await?
            .ok_or_else(|| ApiError::NotFound(spec.label.to_string()))
    }

    /// Documents whose `field` equals `value`, newest first
    pub async fn list_by(
        &self,
        spec: &ResourceSpec,
        field: &str,
        value: &str,
    ) -> StoreResult<Vec<Document>> {
        let query = Query::new()
            .where_eq(field, value)
            .order_by_desc(spec.timestamp_field);
        self.store.query(spec.collection, &query).await
    }

    /// Merge `body` into an existing document. The id and creation
    /// timestamp cannot be changed.
    pub async fn update(&self, spec: &ResourceSpec, id: &str, mut body: Fields) -> StoreResult<Document> {
        body.remove("id");
        body.remove(spec.timestamp_field);

        let doc = self
            .store
            .merge(spec.collection, id, body)
            .await
            .map_err(|e| relabel(e, spec))?;
        tracing::debug!(collection = spec.collection, id = %id, "Document updated");
        Ok(doc)
    }

    pub async fn delete(&self, spec: &ResourceSpec, id: &str) -> StoreResult<()> {
        if !self.store.delete(spec.collection, id).await? {
            return Err(ApiError::NotFound(spec.label.to_string()));
        }
        tracing::info!(collection = spec.collection, id = %id, "Document deleted");
        Ok(())
    }

    pub async fn assign_task(&self, task_id: &str, user_id: &str) -> StoreResult<Document> {
        let doc = self
            .store
            .merge(TASKS.collection, task_id, assignee(user_id))
            .await
            .map_err(|e| relabel(e, &TASKS))?;
        tracing::info!(task_id = %task_id, user_id = %user_id, "Task assigned");
        Ok(doc)
    }

    /// Assign every task concurrently. Failures are reported, not rolled back.
    pub async fn bulk_assign(&self, task_ids: &[String], user_id: &str) -> BulkAssignment {
        let results = join_all(
            task_ids
                .iter()
                .map(|id| self.store.merge(TASKS.collection, id, assignee(user_id))),
        )
        .await;

        let mut assigned = Vec::new();
        let mut failed = Vec::new();
        for (id, result) in task_ids.iter().zip(results) {
            match result {
                Ok(_) => assigned.push(id.clone()),
                Err(e) => {
                    tracing::warn!(task_id = %id, user_id = %user_id, error = %e, "Task assignment failed");
                    failed.push(id.clone());
                }
            }
        }

        let message = format!(
            "{} of {} tasks assigned to user {}",
            assigned.len(),
            task_ids.len(),
            user_id
        );
        tracing::info!(user_id = %user_id, assigned = assigned.len(), failed = failed.len(), "Bulk task assignment");

        BulkAssignment {
            requested: task_ids.len(),
            assigned,
            failed,
            message,
        }
    }

    /// Document count of every collection in the store
    pub async fn collection_counts(&self) -> StoreResult<BTreeMap<String, u64>> {
        let names = self.store.collections().await?;
        let counts = join_all(names.iter().map(|name| self.store.count(name))).await;

        Ok(names
            .into_iter()
            .zip(counts)
            .map(|(name, count)| {
                let count = count.unwrap_or_else(|e| {
                    tracing::error!(collection = %name, error = %e, "Failed to count collection");
                    0
                });
                (name, count)
            })
            .collect())
    }
}

fn assignee(user_id: &str) -> Fields {
    let mut fields = Fields::new();
    fields.insert(ASSIGNEE.to_string(), json!(user_id));
    fields
}

fn relabel(err: ApiError, spec: &ResourceSpec) -> ApiError {
    match err {
        ApiError::NotFound(_) => ApiError::NotFound(spec.label.to_string()),
        other => other,
    }
}
