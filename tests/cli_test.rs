use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_import_catalog_summary() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("orderflow"));
    cmd.arg("import-catalog").arg("tests/fixtures/catalog.csv");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "product_id,store_id,name,price,stock,variants",
        ))
        .stdout(predicate::str::contains("p1,s1,Jollof Rice,2500.00,40,0"))
        // Variant rows fold into their product
        .stdout(predicate::str::contains("p2,s1,Ankara Shirt,8000.00,0,2"))
        .stdout(predicate::str::contains("p3,s1,Delivery Bag,500.00,0,0"))
        .stdout(predicate::str::contains("p2-l").not());

    Ok(())
}

#[test]
fn test_import_catalog_rejects_orphan_variant() -> Result<(), Box<dyn std::error::Error>> {
    let mut csv = tempfile::NamedTempFile::new()?;
    std::io::Write::write_all(
        &mut csv,
        b"store_id,product_id,variant_id,name,sku,price,stock,tracks_inventory,available\n\
          s1,p9,v1,Large,,1.00,1,true,true\n",
    )?;

    let mut cmd = Command::new(cargo_bin!("orderflow"));
    cmd.arg("import-catalog").arg(csv.path());
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("p9"));

    Ok(())
}

#[test]
fn test_sign_webhook_matches_known_signature() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("orderflow"));
    cmd.arg("sign-webhook")
        .arg("--secret")
        .arg("whsec_test_secret")
        .arg("tests/fixtures/webhook.json");

    cmd.assert().success().stdout(predicate::eq(
        "7bf3a88497c86c27db4869604c7736780da9e66a882e5edd9e212acfbd96c8a9\
         e550c15443e9759a05ee5915b8d84b5e16a8d666558aca95510a1c01ecdf493b\n",
    ));

    Ok(())
}

#[test]
fn test_missing_input_fails() {
    let mut cmd = Command::new(cargo_bin!("orderflow"));
    cmd.arg("import-catalog").arg("tests/fixtures/does_not_exist.csv");
    cmd.assert().failure();
}
