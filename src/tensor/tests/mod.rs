mod shape_ops;
