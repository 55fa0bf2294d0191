mod test_loopback_mesh;
