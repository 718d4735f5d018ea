//! End-to-end behavior of the animal pipeline: every animal mutation must
//! leave the items document with exactly one mirror per live animal, and
//! mirror trouble must degrade rather than fail the primary write.

use faunarr::assets::{AssetStore, IncomingUpload};
use faunarr::models::{AnimalRecord, ImageRef, ItemRecord, ItemsDocument};
use faunarr::services::{
    AnimalFields, AnimalService, ItemService, MirrorCoordinator, mirror_item_id,
};
use std::path::{Path, PathBuf};

fn scratch_root() -> PathBuf {
    std::env::temp_dir().join(format!("faunarr-mirror-test-{}", uuid::Uuid::new_v4().simple()))
}

async fn upload(name: &str, bytes: &[u8]) -> IncomingUpload {
    let temp_path = std::env::temp_dir().join(format!(
        "faunarr-spool-{}-{name}",
        uuid::Uuid::new_v4().simple()
    ));
    tokio::fs::write(&temp_path, bytes).await.unwrap();
    IncomingUpload {
        filename: name.to_string(),
        temp_path,
        size: bytes.len() as u64,
        error: None,
    }
}

async fn mirrors(root: &Path) -> Vec<ItemRecord> {
    ItemService::new(root)
        .list()
        .await
        .unwrap()
        .items
        .into_iter()
        .filter(|item| item.linked_animal_id.is_some())
        .collect()
}

#[tokio::test]
async fn create_generates_slugged_id_and_mirror() {
    let root = scratch_root();
    let service = AnimalService::new(&root);

    let write = service
        .create(AnimalFields {
            name: Some("Fox".to_string()),
            ..AnimalFields::default()
        })
        .await
        .unwrap();

    let animal = &write.animal;
    assert!(animal.id.starts_with("fox_"), "id was {}", animal.id);
    assert_eq!(animal.id.len(), "fox_".len() + 6);
    assert!(write.warning.is_none());

    let mirrors = mirrors(&root).await;
    assert_eq!(mirrors.len(), 1);
    let mirror = &mirrors[0];
    assert_eq!(mirror.id, format!("animal-{}", animal.id));
    assert_eq!(mirror.category_id, "animal");
    assert_eq!(mirror.linked_animal_id.as_deref(), Some(animal.id.as_str()));
    assert_eq!(mirror.name, "Fox");

    let _ = tokio::fs::remove_dir_all(&root).await;
}

#[tokio::test]
async fn repeated_names_never_collide() {
    let root = scratch_root();
    let service = AnimalService::new(&root);

    let mut ids = std::collections::HashSet::new();
    for _ in 0..8 {
        let write = service
            .create(AnimalFields {
                name: Some("Fox".to_string()),
                ..AnimalFields::default()
            })
            .await
            .unwrap();
        assert!(ids.insert(write.animal.id.clone()), "duplicate id generated");
    }

    let _ = tokio::fs::remove_dir_all(&root).await;
}

#[tokio::test]
async fn mirror_invariant_holds_through_the_lifecycle() {
    let root = scratch_root();
    let service = AnimalService::new(&root);

    let fox = service
        .create(AnimalFields {
            name: Some("Fox".to_string()),
            ..AnimalFields::default()
        })
        .await
        .unwrap()
        .animal;
    let wolf = service
        .create(AnimalFields {
            name: Some("Wolf".to_string()),
            ..AnimalFields::default()
        })
        .await
        .unwrap()
        .animal;

    let live = mirrors(&root).await;
    assert_eq!(live.len(), 2);

    service
        .update(
            &fox.id,
            AnimalFields {
                notes: Some("den in the birches".to_string()),
                ..AnimalFields::default()
            },
        )
        .await
        .unwrap();

    let live = mirrors(&root).await;
    assert_eq!(live.len(), 2);
    let fox_mirror = live
        .iter()
        .find(|m| m.linked_animal_id.as_deref() == Some(fox.id.as_str()))
        .unwrap();
    assert_eq!(fox_mirror.notes, "den in the birches");

    service.delete(&wolf.id).await.unwrap();
    let live = mirrors(&root).await;
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].linked_animal_id.as_deref(), Some(fox.id.as_str()));

    let _ = tokio::fs::remove_dir_all(&root).await;
}

#[tokio::test]
async fn animal_image_is_copied_not_moved_into_the_mirror() {
    let root = scratch_root();
    let service = AnimalService::new(&root);

    let write = service
        .create(AnimalFields {
            name: Some("Fox".to_string()),
            image: Some(upload("fox.png", b"png bytes").await),
            image_label: "Portrait".to_string(),
            ..AnimalFields::default()
        })
        .await
        .unwrap();
    let animal = write.animal;
    assert!(write.warning.is_none());

    let animal_image = animal.image.as_ref().unwrap();
    assert_eq!(
        animal_image.path,
        format!("Animals/{}/image.png", animal.id)
    );
    assert!(root.join(&animal_image.path).exists());

    let mirror = mirrors(&root).await.remove(0);
    let mirror_image = mirror.image.as_ref().unwrap();
    assert_eq!(
        mirror_image.path,
        format!("Items/animal-{}/image.png", animal.id)
    );
    assert_eq!(mirror_image.label, "Portrait");
    assert!(root.join(&mirror_image.path).exists());

    let _ = tokio::fs::remove_dir_all(&root).await;
}

#[tokio::test]
async fn updated_image_replaces_the_old_mirror_asset() {
    let root = scratch_root();
    let service = AnimalService::new(&root);

    let animal = service
        .create(AnimalFields {
            name: Some("Fox".to_string()),
            image: Some(upload("fox.png", b"old bytes").await),
            ..AnimalFields::default()
        })
        .await
        .unwrap()
        .animal;
    let old_mirror_path = mirrors(&root).await[0].image.as_ref().unwrap().path.clone();

    let updated = service
        .update(
            &animal.id,
            AnimalFields {
                image: Some(upload("fox.jpg", b"new bytes").await),
                ..AnimalFields::default()
            },
        )
        .await
        .unwrap();
    assert!(updated.warning.is_none());
    assert_eq!(
        updated.animal.image.as_ref().unwrap().path,
        format!("Animals/{}/image.jpg", animal.id)
    );

    let mirror = mirrors(&root).await.remove(0);
    let mirror_image = mirror.image.as_ref().unwrap();
    assert_eq!(
        mirror_image.path,
        format!("Items/animal-{}/image.jpg", animal.id)
    );
    assert!(root.join(&mirror_image.path).exists());
    assert!(
        !root.join(&old_mirror_path).exists(),
        "old mirror image should be gone after a successful copy"
    );

    let _ = tokio::fs::remove_dir_all(&root).await;
}

#[tokio::test]
async fn failed_mirror_copy_retains_the_previous_image() {
    let root = scratch_root();
    let assets = AssetStore::new(&root);
    let coordinator = MirrorCoordinator::new(&assets);

    // Seed an existing mirror whose image file really exists.
    let animal_id = "fox_abc123";
    let item_id = mirror_item_id(animal_id);
    let layout = assets.resolve_layout("Items", &item_id).await.unwrap();
    let seeded = assets
        .save_upload(&upload("fox.png", b"old bytes").await, &layout, "image", "")
        .await
        .unwrap();

    let mut items = ItemsDocument::default();
    items.items.push(ItemRecord {
        id: item_id.clone(),
        linked_animal_id: Some(animal_id.to_string()),
        category_id: "animal".to_string(),
        image: Some(seeded.clone()),
        ..ItemRecord::default()
    });

    // The animal claims an image whose backing file is gone, as after a
    // partially failed earlier operation.
    let animal = AnimalRecord {
        id: animal_id.to_string(),
        name: "Fox".to_string(),
        image: Some(ImageRef {
            filename: "image.png".to_string(),
            path: format!("Animals/{animal_id}/image.png"),
            label: String::new(),
            uploaded_at: String::new(),
        }),
        ..AnimalRecord::default()
    };

    let warning = coordinator.project(&animal, &mut items, true).await;
    assert!(warning.is_some(), "copy failure must surface a warning");

    let mirror = items.items.iter().find(|i| i.id == item_id).unwrap();
    assert_eq!(mirror.image.as_ref().unwrap().path, seeded.path);
    assert!(root.join(&seeded.path).exists(), "old image must survive");

    let _ = tokio::fs::remove_dir_all(&root).await;
}

#[tokio::test]
async fn delete_succeeds_when_the_mirror_is_already_gone() {
    let root = scratch_root();
    let service = AnimalService::new(&root);

    let animal = service
        .create(AnimalFields {
            name: Some("Fox".to_string()),
            ..AnimalFields::default()
        })
        .await
        .unwrap()
        .animal;

    // Simulate a pre-existing inconsistency by deleting the mirror out
    // from under the service.
    let items = ItemService::new(&root);
    items
        .delete(&mirror_item_id(&animal.id))
        .await
        .unwrap();

    let outcome = service.delete(&animal.id).await.unwrap();
    assert_eq!(outcome.deleted, animal.id);
    assert!(outcome.warning.is_none());
    assert!(service.list().await.unwrap().is_empty());

    let _ = tokio::fs::remove_dir_all(&root).await;
}

#[tokio::test]
async fn delete_removes_records_assets_and_mirror() {
    let root = scratch_root();
    let service = AnimalService::new(&root);

    let animal = service
        .create(AnimalFields {
            name: Some("Fox".to_string()),
            image: Some(upload("fox.png", b"bytes").await),
            ..AnimalFields::default()
        })
        .await
        .unwrap()
        .animal;

    let animal_dir = root.join("Animals").join(&animal.id);
    let mirror_dir = root.join("Items").join(mirror_item_id(&animal.id));
    assert!(animal_dir.exists());
    assert!(mirror_dir.exists());

    let outcome = service.delete(&animal.id).await.unwrap();
    assert!(outcome.warning.is_none());
    assert!(!animal_dir.exists());
    assert!(!mirror_dir.exists());
    assert!(service.list().await.unwrap().is_empty());
    assert!(mirrors(&root).await.is_empty());

    let _ = tokio::fs::remove_dir_all(&root).await;
}

#[tokio::test]
async fn unavailable_items_store_degrades_instead_of_failing() {
    let root = scratch_root();
    tokio::fs::create_dir_all(&root).await.unwrap();
    // A file at the Items directory path makes every items write fail.
    tokio::fs::write(root.join("Items"), b"blocker").await.unwrap();

    let service = AnimalService::new(&root);
    let write = service
        .create(AnimalFields {
            name: Some("Fox".to_string()),
            ..AnimalFields::default()
        })
        .await
        .unwrap();

    assert!(write.warning.is_some(), "degraded success must carry a warning");
    let animals = service.list().await.unwrap();
    assert_eq!(animals.len(), 1, "the primary write must be durable");

    let _ = tokio::fs::remove_dir_all(&root).await;
}
