pub mod resource_reconciler;
