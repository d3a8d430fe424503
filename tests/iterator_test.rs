//! Iterator emulation over the in-process device.

use piggykv::{Error, Key, KvClient, KvDevice, MemMedia, TransferConfig};

fn client_with_keys(keys: &[u32]) -> KvClient<KvDevice<MemMedia>> {
    let config = TransferConfig { probe_limit: 64, ..Default::default() };
    let client = KvClient::new(KvDevice::in_memory(), config).unwrap();
    for &k in keys {
        client.put(Key::from(k), format!("value-{k}").as_bytes()).unwrap();
    }
    client
}

#[test]
fn test_seek_lands_on_next_present_key() {
    let client = client_with_keys(&[5, 6, 9]);
    let iter = client.create_iter().unwrap();

    assert_eq!(client.seek(iter, Key::from(4)).unwrap(), b"value-5");
    assert_eq!(client.next(iter).unwrap(), b"value-6");
    assert_eq!(client.next(iter).unwrap(), b"value-9");
    assert!(matches!(client.next(iter), Err(Error::NotFound)));
}

#[test]
fn test_seek_on_exact_key() {
    let client = client_with_keys(&[10]);
    let iter = client.create_iter().unwrap();
    assert_eq!(client.seek(iter, Key::from(10)).unwrap(), b"value-10");
}

#[test]
fn test_probe_limit_bounds_the_scan() {
    let client = client_with_keys(&[100]);
    let iter = client.create_iter().unwrap();
    // Key 100 is 99 misses past 1, beyond the 64-probe bound.
    assert!(matches!(client.seek(iter, Key::from(1)), Err(Error::NotFound)));
    // The iterator stays usable; an in-range seek still finds the key.
    assert_eq!(client.seek(iter, Key::from(90)).unwrap(), b"value-100");
}

#[test]
fn test_independent_iterators() {
    let client = client_with_keys(&[1, 2, 3]);
    let a = client.create_iter().unwrap();
    let b = client.create_iter().unwrap();

    assert_eq!(client.seek(a, Key::from(1)).unwrap(), b"value-1");
    assert_eq!(client.seek(b, Key::from(3)).unwrap(), b"value-3");
    assert_eq!(client.next(a).unwrap(), b"value-2");
}

#[test]
fn test_destroyed_iterator_is_rejected() {
    let client = client_with_keys(&[1]);
    let iter = client.create_iter().unwrap();
    client.destroy_iter(iter).unwrap();

    assert!(matches!(client.seek(iter, Key::from(0)), Err(Error::UnknownIterator(_))));
    assert!(matches!(client.next(iter), Err(Error::UnknownIterator(_))));
    assert!(matches!(client.destroy_iter(iter), Err(Error::UnknownIterator(_))));
}

#[test]
fn test_probe_counters_accumulate() {
    let client = client_with_keys(&[3, 7]);
    let iter = client.create_iter().unwrap();
    client.seek(iter, Key::from(0)).unwrap();
    client.next(iter).unwrap();

    let snap = client.stats();
    assert_eq!(snap.gets_for_seek, 4); // probes 0,1,2,3
    assert_eq!(snap.gets_for_next, 4); // probes 4,5,6,7
}
